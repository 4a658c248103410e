// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Unibox integration tests.
//!
//! Fast, deterministic, CI-runnable pieces with no external services:
//!
//! - [`TestHarness`] - temp-DB storage, gateway, and a drainable scheduler
//! - [`CaptureHub`] - a `HubNotifier` that records events for assertions
//! - [`FlakyHandler`] - an `IngestHandler` that fails a scripted number of times
//! - [`payloads`] - canned payloads in each platform's wire shape

pub mod capture_hub;
pub mod harness;
pub mod mock_handler;
pub mod payloads;

pub use capture_hub::CaptureHub;
pub use harness::TestHarness;
pub use mock_handler::FlakyHandler;
