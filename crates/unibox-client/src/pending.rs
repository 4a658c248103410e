// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send-status polling for optimistic messages.
//!
//! After an optimistic send, the client polls the platform's send-status
//! endpoint until the message is confirmed or failed, for a bounded total
//! window. When the window lapses without a terminal answer, polling stops
//! and the timeline entry simply stays pending until the next history
//! refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use unibox_core::types::{Platform, SendStatus};
use unibox_core::SendStatusProbe;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default total polling window per pending message.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// Polls a [`SendStatusProbe`] until a pending send resolves.
pub struct PendingResolver {
    probe: Arc<dyn SendStatusProbe>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl PendingResolver {
    pub fn new(probe: Arc<dyn SendStatusProbe>) -> Self {
        Self {
            probe,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Apply polling timings from `[client]` configuration.
    pub fn with_config(self, config: &unibox_config::model::ClientConfig) -> Self {
        self.with_timing(
            Duration::from_millis(config.status_poll_interval_ms),
            Duration::from_secs(config.pending_window_secs),
        )
    }

    /// Poll until `temp_id` resolves, the window lapses, or `cancel` fires.
    ///
    /// Returns the terminal status, or `None` when the window lapsed or the
    /// poll was cancelled. Probe errors are treated like a still-pending
    /// answer; a flaky status endpoint must not fail the send.
    pub async fn resolve(
        &self,
        platform: Platform,
        temp_id: &str,
        cancel: &CancellationToken,
    ) -> Option<SendStatus> {
        let deadline = Instant::now() + self.max_wait;
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(temp_id, "send-status poll cancelled");
                    return None;
                }
                tick = ticker.tick() => {
                    if tick >= deadline {
                        debug!(temp_id, "send-status window lapsed, entry stays pending");
                        return None;
                    }
                    match self.probe.send_status(platform, temp_id).await {
                        Ok(SendStatus::Pending) => {}
                        Ok(status) => return Some(status),
                        Err(e) => {
                            debug!(temp_id, error = %e, "send-status probe failed, will re-poll");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use unibox_core::UniboxError;

    /// Reports pending until the configured poll, then a terminal status.
    struct ScriptedProbe {
        polls_until_confirm: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SendStatusProbe for ScriptedProbe {
        async fn send_status(
            &self,
            _platform: Platform,
            _temp_id: &str,
        ) -> Result<SendStatus, UniboxError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.polls_until_confirm {
                Ok(SendStatus::Confirmed {
                    message_id: "m-1".to_string(),
                })
            } else {
                Ok(SendStatus::Pending)
            }
        }
    }

    /// Never resolves.
    struct StuckProbe;

    #[async_trait]
    impl SendStatusProbe for StuckProbe {
        async fn send_status(
            &self,
            _platform: Platform,
            _temp_id: &str,
        ) -> Result<SendStatus, UniboxError> {
            Ok(SendStatus::Pending)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_once_probe_confirms() {
        let probe = Arc::new(ScriptedProbe {
            polls_until_confirm: 3,
            calls: AtomicUsize::new(0),
        });
        let resolver = PendingResolver::new(probe.clone())
            .with_timing(Duration::from_millis(100), Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let status = resolver
            .resolve(Platform::Twitter, "tmp-1", &cancel)
            .await;
        assert_eq!(
            status,
            Some(SendStatus::Confirmed {
                message_id: "m-1".to_string()
            })
        );
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_lapse_returns_none() {
        let resolver = PendingResolver::new(Arc::new(StuckProbe))
            .with_timing(Duration::from_millis(100), Duration::from_millis(350));
        let cancel = CancellationToken::new();

        let status = resolver
            .resolve(Platform::Instagram, "tmp-1", &cancel)
            .await;
        assert_eq!(status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let resolver = PendingResolver::new(Arc::new(StuckProbe))
            .with_timing(Duration::from_millis(100), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let status = resolver
            .resolve(Platform::Messenger, "tmp-1", &cancel)
            .await;
        assert_eq!(status, None);
    }
}
