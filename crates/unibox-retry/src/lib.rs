// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable retry scheduling for deferred ingestion payloads.
//!
//! Transient ingestion failures become [`unibox_storage`] retry jobs; the
//! [`RetryScheduler`] polls for due jobs and replays them through an
//! [`unibox_core::IngestHandler`] with bounded exponential backoff.

pub mod backoff;
pub mod scheduler;

pub use backoff::BackoffPolicy;
pub use scheduler::{RetryScheduler, SchedulerOptions};
