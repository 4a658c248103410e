// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-change events fanned out to connected clients.
//!
//! Events serialize as `{"event": <type>, "data": <payload>}` envelopes.
//! Delivery is at-most-once per live connection: there is no buffering or
//! replay, and a client that was offline re-fetches authoritative state via
//! the pull API after reconnecting.

use serde::{Deserialize, Serialize};

use crate::types::{Conversation, Message, Platform};

/// A single event in the real-time fan-out stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    /// A new canonical message was stored.
    NewMessage {
        conversation_id: String,
        message: Message,
    },
    /// A conversation's unread count changed.
    UnreadCountUpdate {
        conversation_id: String,
        platform: Platform,
        unread_count: i64,
    },
    /// A message's read/delivered status changed.
    MessageStatusUpdate {
        conversation_id: String,
        message_id: String,
        is_read: bool,
        delivered_at: Option<i64>,
    },
    /// Conversation metadata changed (participant, last-message time).
    ConversationUpdate { conversation: Conversation },
    /// A connection-scoped error (auth failure, malformed frame).
    Error { code: String, message: String },
}

impl HubEvent {
    /// The wire name of this event type.
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::NewMessage { .. } => "new_message",
            HubEvent::UnreadCountUpdate { .. } => "unread_count_update",
            HubEvent::MessageStatusUpdate { .. } => "message_status_update",
            HubEvent::ConversationUpdate { .. } => "conversation_update",
            HubEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageType;

    fn sample_message() -> Message {
        Message {
            id: "msg-1".into(),
            conversation_id: "conv-1".into(),
            platform_message_id: "pm-1".into(),
            sender_id: "u-1".into(),
            sender_name: "Ada".into(),
            content: "hello".into(),
            message_type: MessageType::Text,
            media_url: None,
            is_outgoing: false,
            is_read: false,
            sent_at: 1_700_000_000_000,
            delivered_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn envelope_shape_matches_wire_contract() {
        let event = HubEvent::NewMessage {
            conversation_id: "conv-1".into(),
            message: sample_message(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "new_message");
        assert_eq!(value["data"]["conversation_id"], "conv-1");
        assert_eq!(value["data"]["message"]["content"], "hello");
    }

    #[test]
    fn event_names_cover_all_five_types() {
        let events = [
            HubEvent::NewMessage {
                conversation_id: "c".into(),
                message: sample_message(),
            },
            HubEvent::UnreadCountUpdate {
                conversation_id: "c".into(),
                platform: Platform::Twitter,
                unread_count: 2,
            },
            HubEvent::MessageStatusUpdate {
                conversation_id: "c".into(),
                message_id: "m".into(),
                is_read: true,
                delivered_at: None,
            },
            HubEvent::ConversationUpdate {
                conversation: Conversation {
                    id: "c".into(),
                    account_id: "a".into(),
                    platform: Platform::Instagram,
                    platform_conversation_id: "pc".into(),
                    participant_id: "p".into(),
                    participant_name: "Ada".into(),
                    participant_avatar: None,
                    last_message_at: 0,
                    unread_count: 0,
                    created_at: "2026-01-01T00:00:00.000Z".into(),
                },
            },
            HubEvent::Error {
                code: "auth_failed".into(),
                message: "invalid token".into(),
            },
        ];
        let names: Vec<_> = events.iter().map(HubEvent::name).collect();
        assert_eq!(
            names,
            vec![
                "new_message",
                "unread_count_update",
                "message_status_update",
                "conversation_update",
                "error"
            ]
        );
    }
}
