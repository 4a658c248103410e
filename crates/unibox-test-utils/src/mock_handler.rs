// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable [`IngestHandler`] for exercising the retry pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use unibox_core::types::{IngestOutcome, Platform};
use unibox_core::{IngestHandler, UniboxError};

/// Fails transiently for the first `failures` calls, then delegates to the
/// wrapped handler. With no delegate, the post-failure calls report a
/// successful no-op ingestion.
pub struct FlakyHandler {
    failures: usize,
    calls: AtomicUsize,
    delegate: Option<Arc<dyn IngestHandler>>,
}

impl FlakyHandler {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            delegate: None,
        }
    }

    pub fn wrapping(failures: usize, delegate: Arc<dyn IngestHandler>) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            delegate: Some(delegate),
        }
    }

    /// Total calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngestHandler for FlakyHandler {
    async fn ingest(
        &self,
        platform: Platform,
        account_id: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<IngestOutcome, UniboxError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(UniboxError::Transient {
                message: format!("injected failure {}", call + 1),
                source: None,
            });
        }
        match &self.delegate {
            Some(handler) => handler.ingest(platform, account_id, raw_payload).await,
            None => Ok(IngestOutcome::Ingested {
                conversations: 0,
                messages_upserted: 0,
                messages_new: 0,
            }),
        }
    }
}
