// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retry scheduler: claims due jobs and replays them through the
//! ingestion gateway.
//!
//! A scheduler is an explicit instance wired up at serve time, never a
//! global. It owns its poll loop; all job state lives in the database, so
//! a crash mid-replay leaves the job `active` with the attempt already
//! counted, and the stale-job sweep returns it to `waiting`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unibox_core::types::{IngestOutcome, RetryJobState};
use unibox_core::{IngestHandler, UniboxError};
use unibox_storage::queries::retry;
use unibox_storage::{Database, RetryJob};

use crate::backoff::BackoffPolicy;

/// How many due jobs one poll tick claims at most.
const CLAIM_BATCH: i64 = 16;

/// How often finished jobs are purged, in poll ticks.
const PURGE_EVERY_TICKS: u32 = 600;

/// Scheduler construction parameters, taken from `[ingest]` config.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub policy: BackoffPolicy,
    pub poll_interval: Duration,
    pub retention_hours: i64,
}

/// Replays deferred ingestion payloads with bounded exponential backoff.
pub struct RetryScheduler {
    db: Database,
    handler: Arc<dyn IngestHandler>,
    options: SchedulerOptions,
}

impl RetryScheduler {
    pub fn new(db: Database, handler: Arc<dyn IngestHandler>, options: SchedulerOptions) -> Self {
        Self {
            db,
            handler,
            options,
        }
    }

    /// Run the poll loop until `cancel` fires.
    ///
    /// Jobs left `active` by a previous crash are swept back to `waiting`
    /// once at startup before polling begins.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), UniboxError> {
        let swept = self.sweep_stale_active().await?;
        if swept > 0 {
            warn!(swept, "recovered jobs left active by an unclean shutdown");
        }

        info!(
            poll_interval_ms = self.options.poll_interval.as_millis() as u64,
            "retry scheduler started"
        );

        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("retry scheduler stopping");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.drain_due().await {
                        error!(error = %e, "retry poll tick failed");
                    }
                    ticks = ticks.wrapping_add(1);
                    if ticks % PURGE_EVERY_TICKS == 0 {
                        match retry::purge_finished(&self.db, self.options.retention_hours).await {
                            Ok(0) => {}
                            Ok(n) => debug!(purged = n, "purged finished retry jobs"),
                            Err(e) => warn!(error = %e, "retry purge failed"),
                        }
                    }
                }
            }
        }
    }

    /// Claim and replay one batch of due jobs. Returns how many jobs were
    /// processed; anything beyond the batch waits for the next poll tick.
    pub async fn drain_due(&self) -> Result<usize, UniboxError> {
        let now = chrono::Utc::now().timestamp_millis();
        let claimed = retry::claim_due(&self.db, now, CLAIM_BATCH).await?;
        let processed = claimed.len();
        for job in claimed {
            let job_id = job.id;
            if let Err(e) = self.replay(job).await {
                // Keep settling the batch; a job stranded `active` is
                // swept back at the next restart.
                error!(job_id, error = %e, "failed to settle replayed job");
            }
        }
        Ok(processed)
    }

    /// Replay one claimed job and settle its state.
    async fn replay(&self, job: RetryJob) -> Result<(), UniboxError> {
        let payload: serde_json::Value = match serde_json::from_str(&job.message_data) {
            Ok(v) => v,
            Err(e) => {
                // Stored by us, so this indicates corruption. Not retryable.
                error!(job_id = job.id, error = %e, "retry job payload is unreadable");
                retry::abandon(&self.db, job.id).await?;
                metrics::counter!("unibox_retry_jobs_total", "result" => "abandoned")
                    .increment(1);
                return Ok(());
            }
        };

        debug!(
            job_id = job.id,
            platform = %job.platform,
            attempt = job.attempts,
            "replaying deferred payload"
        );

        match self
            .handler
            .ingest(job.platform, &job.account_id, &payload)
            .await
        {
            Ok(IngestOutcome::Ingested { messages_new, .. }) => {
                retry::complete(&self.db, job.id).await?;
                info!(job_id = job.id, messages_new, "retry succeeded");
                metrics::counter!("unibox_retry_jobs_total", "result" => "completed")
                    .increment(1);
            }
            Ok(IngestOutcome::Rejected { reason }) => {
                warn!(job_id = job.id, reason, "retry payload rejected, abandoning");
                retry::abandon(&self.db, job.id).await?;
                metrics::counter!("unibox_retry_jobs_total", "result" => "abandoned")
                    .increment(1);
            }
            Ok(IngestOutcome::AuthExpired {
                platform,
                account_id,
            }) => {
                warn!(
                    job_id = job.id,
                    platform = %platform,
                    account_id,
                    "credentials expired, abandoning retry"
                );
                retry::abandon(&self.db, job.id).await?;
                metrics::counter!("unibox_retry_jobs_total", "result" => "abandoned")
                    .increment(1);
            }
            Ok(IngestOutcome::Deferred { job_id }) => {
                // The handler replay path never defers; a new job would
                // duplicate this one.
                warn!(job_id = job.id, new_job_id = job_id, "unexpected defer during replay");
                retry::complete(&self.db, job.id).await?;
            }
            Err(e) if e.is_transient() => {
                let attempts = u32::try_from(job.attempts).unwrap_or(u32::MAX);
                let delay = self.options.policy.jittered_delay_ms(attempts);
                let next_run_at =
                    chrono::Utc::now().timestamp_millis() + i64::try_from(delay).unwrap_or(i64::MAX);
                let state = retry::fail(&self.db, job.id, next_run_at).await?;
                match state {
                    RetryJobState::Failed => {
                        error!(
                            job_id = job.id,
                            attempts = job.attempts,
                            error = %e,
                            "retry attempts exhausted"
                        );
                        metrics::counter!("unibox_retry_jobs_total", "result" => "exhausted")
                            .increment(1);
                    }
                    _ => {
                        warn!(
                            job_id = job.id,
                            attempt = job.attempts,
                            delay_ms = delay,
                            error = %e,
                            "retry failed, backing off"
                        );
                        metrics::counter!("unibox_retry_jobs_total", "result" => "backed_off")
                            .increment(1);
                    }
                }
            }
            Err(e) => {
                error!(job_id = job.id, error = %e, "permanent replay failure, abandoning");
                retry::abandon(&self.db, job.id).await?;
                metrics::counter!("unibox_retry_jobs_total", "result" => "abandoned")
                    .increment(1);
            }
        }
        Ok(())
    }

    /// Return any `active` jobs to `waiting`, immediately eligible.
    ///
    /// Only safe at startup, before the poll loop runs, when no replay can
    /// be in flight.
    async fn sweep_stale_active(&self) -> Result<usize, UniboxError> {
        let stale = retry::list_by_state(&self.db, RetryJobState::Active, i64::MAX).await?;
        let count = stale.len();
        for job in stale {
            let now = chrono::Utc::now().timestamp_millis();
            // The claim already counted the attempt; settle it as a failure
            // so exhausted jobs do not loop forever after repeated crashes.
            retry::fail(&self.db, job.id, now).await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use unibox_core::types::Platform;

    const OPTIONS: SchedulerOptions = SchedulerOptions {
        policy: BackoffPolicy {
            base_ms: 10,
            cap_ms: 100,
        },
        poll_interval: Duration::from_millis(10),
        retention_hours: 24,
    };

    /// Handler that fails transiently `failures` times, then succeeds.
    struct FlakyHandler {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IngestHandler for FlakyHandler {
        async fn ingest(
            &self,
            _platform: Platform,
            _account_id: &str,
            _raw_payload: &serde_json::Value,
        ) -> Result<IngestOutcome, UniboxError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(UniboxError::Transient {
                    message: "synthetic outage".to_string(),
                    source: None,
                })
            } else {
                Ok(IngestOutcome::Ingested {
                    conversations: 1,
                    messages_upserted: 1,
                    messages_new: 1,
                })
            }
        }
    }

    /// Handler whose first replay hides the retry table so the settle
    /// write fails, then restores it before the next job settles.
    struct TableHidingHandler {
        db: Database,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IngestHandler for TableHidingHandler {
        async fn ingest(
            &self,
            _platform: Platform,
            _account_id: &str,
            _raw_payload: &serde_json::Value,
        ) -> Result<IngestOutcome, UniboxError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let sql = if call == 0 {
                "ALTER TABLE retry_jobs RENAME TO retry_jobs_hidden;"
            } else {
                "ALTER TABLE retry_jobs_hidden RENAME TO retry_jobs;"
            };
            self.db
                .connection()
                .call(move |conn| {
                    conn.execute_batch(sql)?;
                    Ok::<_, rusqlite::Error>(())
                })
                .await
                .unwrap();
            Ok(IngestOutcome::Ingested {
                conversations: 1,
                messages_upserted: 1,
                messages_new: 1,
            })
        }
    }

    struct RejectingHandler;

    #[async_trait]
    impl IngestHandler for RejectingHandler {
        async fn ingest(
            &self,
            _platform: Platform,
            _account_id: &str,
            _raw_payload: &serde_json::Value,
        ) -> Result<IngestOutcome, UniboxError> {
            Ok(IngestOutcome::Rejected {
                reason: "malformed".to_string(),
            })
        }
    }

    async fn setup(handler: Arc<dyn IngestHandler>) -> (RetryScheduler, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let scheduler = RetryScheduler::new(db.clone(), handler, OPTIONS);
        (scheduler, db, dir)
    }

    async fn enqueue_due(db: &Database) -> i64 {
        retry::enqueue(db, Platform::Twitter, "acct-1", r#"{"k":1}"#, r#"{"k":1}"#, 3, 0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn successful_replay_completes_the_job() {
        let handler = Arc::new(FlakyHandler {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let (scheduler, db, _dir) = setup(handler.clone()).await;
        let id = enqueue_due(&db).await;

        assert_eq!(scheduler.drain_due().await.unwrap(), 1);
        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Completed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transient_failure_backs_off_then_succeeds() {
        let handler = Arc::new(FlakyHandler {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let (scheduler, db, _dir) = setup(handler.clone()).await;
        let id = enqueue_due(&db).await;

        // First drain: one transient failure, job back to waiting with a deadline.
        scheduler.drain_due().await.unwrap();
        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Waiting);
        assert_eq!(job.attempts, 1);
        assert!(job.next_run_at > 0);

        // Wait past the (tiny) backoff and drain twice more.
        for _ in 0..2 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            scheduler.drain_due().await.unwrap();
        }
        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Completed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_job_ends_failed_and_stops_being_claimed() {
        let handler = Arc::new(FlakyHandler {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let (scheduler, db, _dir) = setup(handler.clone()).await;
        let id = enqueue_due(&db).await;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            scheduler.drain_due().await.unwrap();
        }

        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Failed);
        assert_eq!(job.attempts, 3);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3, "no claims past max attempts");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_replay_is_abandoned_not_retried() {
        let (scheduler, db, _dir) = setup(Arc::new(RejectingHandler)).await;
        let id = enqueue_due(&db).await;

        scheduler.drain_due().await.unwrap();
        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Failed);
        assert_eq!(job.attempts, 1, "remaining attempts are not burned");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_payload_is_abandoned() {
        let (scheduler, db, _dir) = setup(Arc::new(RejectingHandler)).await;
        let id = retry::enqueue(&db, Platform::Twitter, "acct-1", "not json", "not json", 3, 0)
            .await
            .unwrap();

        scheduler.drain_due().await.unwrap();
        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Failed);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn settle_failure_does_not_strand_the_rest_of_the_batch() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let handler = Arc::new(TableHidingHandler {
            db: db.clone(),
            calls: AtomicUsize::new(0),
        });
        let scheduler = RetryScheduler::new(db.clone(), handler.clone(), OPTIONS);
        let first = enqueue_due(&db).await;
        let second = enqueue_due(&db).await;

        // Both claimed jobs are replayed even though the first settle
        // write fails.
        assert_eq!(scheduler.drain_due().await.unwrap(), 2);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        let stranded = retry::get(&db, first).await.unwrap().unwrap();
        assert_eq!(stranded.state, RetryJobState::Active);
        let settled = retry::get(&db, second).await.unwrap().unwrap();
        assert_eq!(settled.state, RetryJobState::Completed);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn rearmed_job_gets_a_fresh_attempt_budget() {
        let handler = Arc::new(FlakyHandler {
            failures: 3,
            calls: AtomicUsize::new(0),
        });
        let (scheduler, db, _dir) = setup(handler.clone()).await;
        let id = enqueue_due(&db).await;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            scheduler.drain_due().await.unwrap();
        }
        assert_eq!(
            retry::get(&db, id).await.unwrap().unwrap().state,
            RetryJobState::Failed
        );

        // Manual retry: attempts reset, next claim succeeds (4th handler call).
        assert!(retry::rearm(&db, id).await.unwrap());
        scheduler.drain_due().await.unwrap();
        let job = retry::get(&db, id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Completed);
        assert_eq!(job.attempts, 1);

        db.close().await.unwrap();
    }
}
