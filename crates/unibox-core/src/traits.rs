// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between pipeline stages.
//!
//! Defined here so the retry scheduler, ingestion gateway, hub, and client
//! crates depend on each other only through unibox-core. All traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

use async_trait::async_trait;

use crate::error::UniboxError;
use crate::events::HubEvent;
use crate::types::{IngestOutcome, Platform, SendStatus};

/// Receives store-change events for fan-out to a user's live sessions.
///
/// Implementations must never surface an error for a session that has
/// already disconnected: emitting to a dead connection is a silent no-op.
#[async_trait]
pub trait HubNotifier: Send + Sync + 'static {
    /// Deliver `event` to every live session belonging to `user_id`.
    async fn notify(&self, user_id: &str, event: HubEvent);
}

/// A no-op notifier for contexts without a running hub (tests, one-shot CLI).
pub struct NullNotifier;

#[async_trait]
impl HubNotifier for NullNotifier {
    async fn notify(&self, _user_id: &str, _event: HubEvent) {}
}

/// Processes one ingestion payload. Implemented by the ingestion gateway and
/// invoked by the retry scheduler when replaying a job.
#[async_trait]
pub trait IngestHandler: Send + Sync + 'static {
    /// Ingest a raw platform payload for an account.
    async fn ingest(
        &self,
        platform: Platform,
        account_id: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<IngestOutcome, UniboxError>;
}

/// Per-platform send-status endpoint, polled by the client reconciliation
/// layer while an optimistic message awaits confirmation.
#[async_trait]
pub trait SendStatusProbe: Send + Sync + 'static {
    /// Report the delivery status of the optimistic message `temp_id`.
    async fn send_status(
        &self,
        platform: Platform,
        temp_id: &str,
    ) -> Result<SendStatus, UniboxError>;
}
