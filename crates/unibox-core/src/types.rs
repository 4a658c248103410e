// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical data model shared across the workspace.
//!
//! The normalizer produces platform-independent *fragments*
//! ([`ConversationFragment`], [`MessageFragment`]); the storage layer turns
//! them into stored [`Conversation`] and [`Message`] rows. Timestamps that
//! determine ordering (`sent_at`, `last_message_at`) are epoch milliseconds;
//! bookkeeping timestamps (`created_at`) are RFC 3339 strings.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// External chat platform a payload originates from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Linkedin,
    Messenger,
}

/// Content kind of a canonical message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    File,
}

// --- Normalizer output fragments ---

/// Platform-independent conversation data extracted from a raw payload.
///
/// Carries no store identity yet; the ingestion gateway resolves it to a
/// stored [`Conversation`] via upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationFragment {
    /// The platform's own conversation/thread identifier.
    pub platform_conversation_id: String,
    /// Counterpart participant's platform user id.
    pub participant_id: String,
    /// Counterpart participant's display name.
    pub participant_name: String,
    /// Counterpart participant's avatar URL, when the platform supplies one.
    pub participant_avatar: Option<String>,
}

/// Platform-independent message data extracted from a raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFragment {
    /// The platform's message id. Unique within a conversation — the dedup key.
    pub platform_message_id: String,
    pub sender_id: String,
    pub sender_name: String,
    /// Human-readable content. Never empty: variant payloads without text map
    /// to a documented fallback string.
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    /// Whether the account owner sent this message.
    pub is_outgoing: bool,
    /// Epoch milliseconds. Defines display order within a conversation.
    pub sent_at: i64,
    pub delivered_at: Option<i64>,
}

/// One conversation plus its messages, as produced by `normalize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedConversation {
    pub conversation: ConversationFragment,
    pub messages: Vec<MessageFragment>,
}

// --- Stored canonical records ---

/// A stored canonical conversation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub account_id: String,
    pub platform: Platform,
    pub platform_conversation_id: String,
    pub participant_id: String,
    pub participant_name: String,
    pub participant_avatar: Option<String>,
    /// Epoch milliseconds of the newest message.
    pub last_message_at: i64,
    /// Count of unread inbound messages. Never negative.
    pub unread_count: i64,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// A stored canonical message row.
///
/// At most one row exists per `(conversation_id, platform_message_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub platform_message_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub is_outgoing: bool,
    pub is_read: bool,
    /// Epoch milliseconds. Defines display order within a conversation.
    pub sent_at: i64,
    pub delivered_at: Option<i64>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

// --- Retry queue ---

/// Lifecycle state of a [`RetryJob`].
///
/// State only advances forward, except the explicit manual-retry operation
/// which re-arms a failed job back to `Waiting`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RetryJobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

/// A durable ingestion retry job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryJob {
    pub id: i64,
    pub platform: Platform,
    pub account_id: String,
    /// The payload to replay through the ingestion gateway.
    pub message_data: String,
    /// The original raw payload, retained for operator diagnostics.
    pub original_payload: String,
    /// Number of processing attempts so far. Never exceeds `max_attempts`.
    pub attempts: i64,
    pub max_attempts: i64,
    pub state: RetryJobState,
    /// RFC 3339 timestamp of the first processing attempt, if any.
    pub first_attempt_at: Option<String>,
    /// Epoch milliseconds before which the job must not be claimed.
    pub next_run_at: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-state job counts for operator dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryJobCounts {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

// --- Ingestion outcome ---

/// Result of one call to the ingestion gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The payload was normalized and persisted.
    Ingested {
        conversations: usize,
        /// Messages written, including re-ingested duplicates resolved by upsert.
        messages_upserted: usize,
        /// Messages that did not previously exist in the store.
        messages_new: usize,
    },
    /// A transient failure occurred; a retry job was enqueued.
    Deferred { job_id: i64 },
    /// The payload failed validation and was dropped. Never retried.
    Rejected { reason: String },
    /// The platform rejected the account's credentials; caller should
    /// prompt re-authentication.
    AuthExpired {
        platform: Platform,
        account_id: String,
    },
}

/// Delivery status of an optimistically sent message, as reported by the
/// per-platform status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendStatus {
    /// Still awaiting confirmation.
    Pending,
    /// Confirmed; carries the canonical message id that superseded the
    /// optimistic placeholder.
    Confirmed { message_id: String },
    /// The send failed permanently.
    Failed { reason: String },
}
