// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion gateway for raw platform payloads.
//!
//! Sits between the external sync collaborators and the canonical store:
//! normalizes payloads, classifies failures (validation vs transient vs
//! expired credentials), persists idempotently, and fans store changes out
//! through a [`unibox_core::HubNotifier`].

pub mod gateway;
pub mod locks;

pub use gateway::{GatewayOptions, IngestGateway};
pub use locks::SyncLocks;
