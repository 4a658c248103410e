// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingestion gateway: normalize, classify, persist, fan out.
//!
//! One `ingest` call processes one raw platform payload: the normalizer
//! turns it into canonical fragments, conversations and messages are
//! upserted idempotently, unread counters are bumped for new inbound
//! messages, and the hub is notified of every store change. Syncs for the
//! same (platform, account) pair are serialized through [`SyncLocks`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use unibox_core::events::HubEvent;
use unibox_core::types::{IngestOutcome, NormalizedConversation, Platform};
use unibox_core::{HubNotifier, IngestHandler, UniboxError};
use unibox_retry::BackoffPolicy;
use unibox_storage::queries::{conversations, messages, retry};
use unibox_storage::Database;

use crate::locks::SyncLocks;

/// Gateway construction parameters, taken from `[ingest]` config.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub max_attempts: i64,
    pub policy: BackoffPolicy,
    /// Account id -> owning user id, for hub fan-out targeting. Unlisted
    /// accounts fall back to the account id itself.
    pub account_owners: HashMap<String, String>,
}

pub struct IngestGateway {
    db: Database,
    notifier: Arc<dyn HubNotifier>,
    locks: SyncLocks,
    options: GatewayOptions,
}

impl IngestGateway {
    pub fn new(db: Database, notifier: Arc<dyn HubNotifier>, options: GatewayOptions) -> Self {
        Self {
            db,
            notifier,
            locks: SyncLocks::new(),
            options,
        }
    }

    /// Ingest, deferring to the retry queue on transient failure.
    ///
    /// The HTTP ingest route calls this; the retry scheduler calls the bare
    /// [`IngestHandler::ingest`] instead so a failed replay backs off its
    /// existing job rather than enqueueing a new one.
    pub async fn ingest_or_defer(
        &self,
        platform: Platform,
        account_id: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<IngestOutcome, UniboxError> {
        match self.ingest(platform, account_id, raw_payload).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_transient() => {
                let payload = raw_payload.to_string();
                let delay = self.options.policy.jittered_delay_ms(1);
                let next_run_at = chrono::Utc::now().timestamp_millis()
                    + i64::try_from(delay).unwrap_or(i64::MAX);
                let job_id = retry::enqueue(
                    &self.db,
                    platform,
                    account_id,
                    &payload,
                    &payload,
                    self.options.max_attempts,
                    next_run_at,
                )
                .await?;
                warn!(
                    platform = %platform,
                    account_id,
                    job_id,
                    delay_ms = delay,
                    error = %e,
                    "transient ingest failure, deferred to retry queue"
                );
                metrics::counter!("unibox_ingest_total", "result" => "deferred").increment(1);
                Ok(IngestOutcome::Deferred { job_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve the fan-out target for an account.
    pub fn owner_of(&self, account_id: &str) -> String {
        self.options
            .account_owners
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| account_id.to_string())
    }

    async fn persist(
        &self,
        platform: Platform,
        account_id: &str,
        normalized: Vec<NormalizedConversation>,
    ) -> Result<IngestOutcome, UniboxError> {
        let user_id = self.owner_of(account_id);
        let conversation_count = normalized.len();
        let mut messages_upserted = 0;
        let mut messages_new = 0;

        for item in normalized {
            let newest = item.messages.iter().map(|m| m.sent_at).max().unwrap_or(0);
            let conv =
                conversations::upsert(&self.db, account_id, platform, &item.conversation, newest)
                    .await?;

            let mut unread_delta = 0;
            for fragment in &item.messages {
                let (message, was_new) = messages::upsert(&self.db, &conv.id, fragment).await?;
                messages_upserted += 1;
                if was_new {
                    messages_new += 1;
                    if !message.is_outgoing {
                        unread_delta += 1;
                    }
                    self.notifier
                        .notify(
                            &user_id,
                            HubEvent::NewMessage {
                                conversation_id: conv.id.clone(),
                                message,
                            },
                        )
                        .await;
                }
            }

            if unread_delta > 0 {
                let unread_count =
                    conversations::increment_unread(&self.db, &conv.id, unread_delta).await?;
                self.notifier
                    .notify(
                        &user_id,
                        HubEvent::UnreadCountUpdate {
                            conversation_id: conv.id.clone(),
                            platform,
                            unread_count,
                        },
                    )
                    .await;
            }

            // Refresh so the event carries the post-upsert counters.
            if let Some(conv) = conversations::get(&self.db, &conv.id).await? {
                self.notifier
                    .notify(&user_id, HubEvent::ConversationUpdate { conversation: conv })
                    .await;
            }
        }

        info!(
            platform = %platform,
            account_id,
            conversations = conversation_count,
            messages_upserted,
            messages_new,
            "payload ingested"
        );
        metrics::counter!("unibox_ingest_total", "result" => "ingested").increment(1);
        metrics::counter!("unibox_messages_ingested_total", "platform" => platform.to_string())
            .increment(messages_new as u64);

        Ok(IngestOutcome::Ingested {
            conversations: conversation_count,
            messages_upserted,
            messages_new,
        })
    }
}

/// Classification of a platform-reported error embedded in a payload.
///
/// External sync collaborators forward the platform's error body verbatim
/// when a fetch fails; the gateway turns it into the right outcome instead
/// of feeding it to the normalizer.
enum PayloadError {
    AuthExpired,
    Transient(String),
}

fn classify_payload_error(raw: &serde_json::Value) -> Option<PayloadError> {
    let error = raw.get("error")?;
    let code = error.get("code").and_then(serde_json::Value::as_i64);
    let text = match error {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("platform error")
            .to_string(),
    };
    if code == Some(401) || text.to_ascii_lowercase().contains("auth") {
        Some(PayloadError::AuthExpired)
    } else {
        Some(PayloadError::Transient(text))
    }
}

#[async_trait]
impl IngestHandler for IngestGateway {
    async fn ingest(
        &self,
        platform: Platform,
        account_id: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<IngestOutcome, UniboxError> {
        let _guard = self.locks.acquire(platform, account_id).await;

        match classify_payload_error(raw_payload) {
            Some(PayloadError::AuthExpired) => {
                warn!(platform = %platform, account_id, "platform reports expired credentials");
                metrics::counter!("unibox_ingest_total", "result" => "auth_expired").increment(1);
                return Ok(IngestOutcome::AuthExpired {
                    platform,
                    account_id: account_id.to_string(),
                });
            }
            Some(PayloadError::Transient(message)) => {
                return Err(UniboxError::Transient {
                    message,
                    source: None,
                });
            }
            None => {}
        }

        let normalized = match unibox_normalize::normalize(platform, raw_payload) {
            Ok(normalized) => normalized,
            Err(UniboxError::Validation { platform, message }) => {
                warn!(platform = %platform, account_id, message, "payload rejected");
                metrics::counter!("unibox_ingest_total", "result" => "rejected").increment(1);
                return Ok(IngestOutcome::Rejected { reason: message });
            }
            Err(e) => return Err(e),
        };

        debug!(
            platform = %platform,
            account_id,
            conversations = normalized.len(),
            "payload normalized"
        );
        self.persist(platform, account_id, normalized).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use unibox_core::types::RetryJobState;

    /// Notifier that records every (user, event) pair it sees.
    #[derive(Default)]
    struct CaptureNotifier {
        events: Mutex<Vec<(String, HubEvent)>>,
    }

    #[async_trait]
    impl HubNotifier for CaptureNotifier {
        async fn notify(&self, user_id: &str, event: HubEvent) {
            self.events
                .lock()
                .unwrap()
                .push((user_id.to_string(), event));
        }
    }

    impl CaptureNotifier {
        fn names(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|(_, e)| e.name())
                .collect()
        }
    }

    fn options() -> GatewayOptions {
        GatewayOptions {
            max_attempts: 3,
            policy: BackoffPolicy {
                base_ms: 10,
                cap_ms: 100,
            },
            account_owners: HashMap::from([("acct-1".to_string(), "user-7".to_string())]),
        }
    }

    async fn setup() -> (IngestGateway, Arc<CaptureNotifier>, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let notifier = Arc::new(CaptureNotifier::default());
        let gateway = IngestGateway::new(db.clone(), notifier.clone(), options());
        (gateway, notifier, db, dir)
    }

    fn twitter_payload() -> serde_json::Value {
        serde_json::json!({
            "self_user_id": "100",
            "conversations": [
                { "conversation_id": "100-200", "participant_id": "200" }
            ],
            "entries": [
                {
                    "id": "ev-1",
                    "created_timestamp": "1700000001000",
                    "message": { "conversation_id": "100-200", "sender_id": "200", "text": "hey" }
                }
            ],
            "users": {
                "200": { "name": "Ada Lovelace" }
            }
        })
    }

    #[tokio::test]
    async fn ingest_persists_and_notifies() {
        let (gateway, notifier, db, _dir) = setup().await;

        let outcome = gateway
            .ingest(Platform::Twitter, "acct-1", &twitter_payload())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Ingested {
                conversations: 1,
                messages_upserted: 1,
                messages_new: 1,
            }
        );

        assert_eq!(
            notifier.names(),
            vec!["new_message", "unread_count_update", "conversation_update"]
        );
        // Fan-out goes to the configured owner of the account.
        for (user, _) in notifier.events.lock().unwrap().iter() {
            assert_eq!(user, "user-7");
        }

        let convs = conversations::list(&db, Some("acct-1")).await.unwrap();
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].unread_count, 1);
        assert_eq!(convs[0].last_message_at, 1_700_000_001_000);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reingest_is_idempotent_and_quiet() {
        let (gateway, notifier, db, _dir) = setup().await;

        gateway
            .ingest(Platform::Twitter, "acct-1", &twitter_payload())
            .await
            .unwrap();
        let before = notifier.events.lock().unwrap().len();

        let outcome = gateway
            .ingest(Platform::Twitter, "acct-1", &twitter_payload())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Ingested {
                conversations: 1,
                messages_upserted: 1,
                messages_new: 0,
            }
        );

        // No duplicate message, unread unchanged, only a conversation_update.
        let convs = conversations::list(&db, Some("acct-1")).await.unwrap();
        assert_eq!(convs[0].unread_count, 1);
        let after = notifier.names();
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&"conversation_update"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outgoing_messages_do_not_bump_unread() {
        let (gateway, _notifier, db, _dir) = setup().await;

        let payload = serde_json::json!({
            "self_user_id": "100",
            "conversations": [{ "conversation_id": "c1", "participant_id": "200" }],
            "entries": [{
                "id": "e1",
                "created_timestamp": "1700000000000",
                "message": { "conversation_id": "c1", "sender_id": "100", "text": "me" }
            }],
            "users": {}
        });
        gateway
            .ingest(Platform::Twitter, "acct-1", &payload)
            .await
            .unwrap();

        let convs = conversations::list(&db, Some("acct-1")).await.unwrap();
        assert_eq!(convs[0].unread_count, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_not_deferred() {
        let (gateway, notifier, db, _dir) = setup().await;

        let outcome = gateway
            .ingest_or_defer(Platform::Twitter, "acct-1", &serde_json::json!("nope"))
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Rejected { .. }));
        assert!(notifier.names().is_empty());

        // Validation failures never become retry jobs.
        let counts = retry::counts(&db).await.unwrap();
        assert_eq!(counts.waiting, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn auth_error_payload_yields_auth_expired() {
        let (gateway, _notifier, db, _dir) = setup().await;

        let payload = serde_json::json!({ "error": { "code": 401, "message": "token expired" } });
        let outcome = gateway
            .ingest_or_defer(Platform::Instagram, "acct-1", &payload)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::AuthExpired {
                platform: Platform::Instagram,
                account_id: "acct-1".to_string(),
            }
        );

        // Not retryable: no job enqueued.
        let counts = retry::counts(&db).await.unwrap();
        assert_eq!(counts.waiting, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn platform_outage_payload_is_deferred() {
        let (gateway, _notifier, db, _dir) = setup().await;

        let payload = serde_json::json!({ "error": { "code": 503, "message": "over capacity" } });
        let outcome = gateway
            .ingest_or_defer(Platform::Twitter, "acct-1", &payload)
            .await
            .unwrap();
        let IngestOutcome::Deferred { job_id } = outcome else {
            panic!("expected deferral, got {outcome:?}");
        };

        let job = retry::get(&db, job_id).await.unwrap().unwrap();
        assert_eq!(job.state, RetryJobState::Waiting);
        assert_eq!(job.attempts, 0, "direct attempt does not consume the budget");
        assert_eq!(job.max_attempts, 3);
        assert!(job.next_run_at > 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unlisted_account_falls_back_to_itself_as_owner() {
        let (gateway, notifier, db, _dir) = setup().await;

        gateway
            .ingest(Platform::Twitter, "acct-unmapped", &twitter_payload())
            .await
            .unwrap();
        assert!(notifier
            .events
            .lock()
            .unwrap()
            .iter()
            .all(|(user, _)| user == "acct-unmapped"));

        db.close().await.unwrap();
    }
}
