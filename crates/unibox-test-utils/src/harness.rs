// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness assembling the full ingestion stack.
//!
//! `TestHarness` wires a temp-file SQLite database, a capturing hub
//! notifier, the ingestion gateway, and a retry scheduler ready to drain on
//! demand. Tests drive it through `ingest()` and assert against the store
//! and the captured events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use unibox_core::types::{IngestOutcome, Platform};
use unibox_core::UniboxError;
use unibox_ingest::{GatewayOptions, IngestGateway};
use unibox_retry::{BackoffPolicy, RetryScheduler, SchedulerOptions};
use unibox_storage::Database;

use crate::capture_hub::CaptureHub;

/// Builder for a [`TestHarness`].
pub struct TestHarnessBuilder {
    max_attempts: i64,
    backoff: BackoffPolicy,
    account_owners: HashMap<String, String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            max_attempts: 3,
            // Tight backoff so drain loops do not stall tests.
            backoff: BackoffPolicy {
                base_ms: 1,
                cap_ms: 5,
            },
            account_owners: HashMap::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Map an account to its owning user for fan-out assertions.
    pub fn with_account_owner(
        mut self,
        account_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        self.account_owners.insert(account_id.into(), user_id.into());
        self
    }

    pub async fn build(self) -> Result<TestHarness, UniboxError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| UniboxError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db_path = db_path.to_string_lossy().to_string();
        let db = Database::open(&db_path).await?;

        let hub = Arc::new(CaptureHub::new());
        let gateway = Arc::new(IngestGateway::new(
            db.clone(),
            hub.clone(),
            GatewayOptions {
                max_attempts: self.max_attempts,
                policy: self.backoff.clone(),
                account_owners: self.account_owners,
            },
        ));
        let scheduler = RetryScheduler::new(
            db.clone(),
            gateway.clone(),
            SchedulerOptions {
                policy: self.backoff,
                poll_interval: Duration::from_millis(5),
                retention_hours: 24,
            },
        );

        Ok(TestHarness {
            db,
            hub,
            gateway,
            scheduler,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete ingestion environment over a throwaway database.
pub struct TestHarness {
    pub db: Database,
    /// Captures every event the gateway fans out.
    pub hub: Arc<CaptureHub>,
    pub gateway: Arc<IngestGateway>,
    /// Not running; call [`RetryScheduler::drain_due`] to replay jobs.
    pub scheduler: RetryScheduler,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Push one payload through the gateway's deferring entry point.
    pub async fn ingest(
        &self,
        platform: Platform,
        account_id: &str,
        payload: &serde_json::Value,
    ) -> Result<IngestOutcome, UniboxError> {
        self.gateway
            .ingest_or_defer(platform, account_id, payload)
            .await
    }

    /// Drain the retry queue until no due job remains, waiting out tiny
    /// test backoffs in between.
    pub async fn drain_retries(&self) -> Result<usize, UniboxError> {
        let mut total = 0;
        loop {
            let processed = self.scheduler.drain_due().await?;
            if processed == 0 {
                return Ok(total);
            }
            total += processed;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
