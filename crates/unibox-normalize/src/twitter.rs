// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twitter-style payload normalization.
//!
//! The payload carries a flat list of DM event entries plus a `users`
//! side-table. Messages are located by matching each conversation's
//! identifier against the flat entry list; sender display names are resolved
//! through the side-table keyed by user id, falling back to a generic
//! placeholder when the user record is absent.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use unibox_core::{
    ConversationFragment, MessageFragment, MessageType, NormalizedConversation, Platform,
    UniboxError,
};

/// Display name used when the sender is missing from the `users` side-table.
const UNKNOWN_SENDER: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct TwitterPayload {
    conversations: Vec<TwitterConversation>,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
    #[serde(default)]
    users: HashMap<String, TwitterUser>,
    /// The account owner's user id, used to mark outgoing messages.
    #[serde(default)]
    self_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterConversation {
    conversation_id: String,
    participant_id: String,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    name: String,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterEntry {
    id: String,
    /// Epoch milliseconds, sent as a decimal string.
    created_timestamp: serde_json::Value,
    message: TwitterMessage,
}

#[derive(Debug, Deserialize)]
struct TwitterMessage {
    conversation_id: String,
    sender_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attachment: Option<TwitterAttachment>,
}

#[derive(Debug, Deserialize)]
struct TwitterAttachment {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    media_url: Option<String>,
}

/// Normalize a Twitter-style payload.
pub fn normalize(raw: &serde_json::Value) -> Result<Vec<NormalizedConversation>, UniboxError> {
    let payload: TwitterPayload =
        serde_json::from_value(raw.clone()).map_err(|e| UniboxError::Validation {
            platform: Platform::Twitter,
            message: format!("unparseable twitter payload: {e}"),
        })?;

    // Parse entries individually so one malformed entry never discards the batch.
    let entries: Vec<TwitterEntry> = payload
        .entries
        .iter()
        .filter_map(|value| match serde_json::from_value(value.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "twitter: skipping malformed entry");
                None
            }
        })
        .collect();

    let mut result = Vec::with_capacity(payload.conversations.len());
    for conv in &payload.conversations {
        let participant = payload.users.get(&conv.participant_id);
        let fragment = ConversationFragment {
            platform_conversation_id: conv.conversation_id.clone(),
            participant_id: conv.participant_id.clone(),
            participant_name: participant
                .map(|u| u.name.clone())
                .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            participant_avatar: participant.and_then(|u| u.profile_image_url.clone()),
        };

        let messages = entries
            .iter()
            .filter(|entry| entry.message.conversation_id == conv.conversation_id)
            .filter_map(|entry| to_message(entry, &payload))
            .collect();

        result.push(NormalizedConversation {
            conversation: fragment,
            messages,
        });
    }

    Ok(result)
}

fn to_message(entry: &TwitterEntry, payload: &TwitterPayload) -> Option<MessageFragment> {
    let sent_at = match crate::epoch_ms(&entry.created_timestamp) {
        Some(ts) => ts,
        None => {
            debug!(entry_id = %entry.id, "twitter: skipping entry with bad timestamp");
            return None;
        }
    };

    let sender = payload.users.get(&entry.message.sender_id);
    let (message_type, media_url) = match &entry.message.attachment {
        Some(att) => match att.kind.as_str() {
            "photo" => (MessageType::Image, att.media_url.clone()),
            "video" | "animated_gif" => (MessageType::Video, att.media_url.clone()),
            _ => (MessageType::File, att.media_url.clone()),
        },
        None => (MessageType::Text, None),
    };

    let content = if entry.message.text.is_empty() {
        "[Media]".to_string()
    } else {
        entry.message.text.clone()
    };

    Some(MessageFragment {
        platform_message_id: entry.id.clone(),
        sender_id: entry.message.sender_id.clone(),
        sender_name: sender
            .map(|u| u.name.clone())
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        content,
        message_type,
        media_url,
        is_outgoing: payload.self_user_id.as_deref() == Some(entry.message.sender_id.as_str()),
        sent_at,
        delivered_at: None,
    })
}

#[cfg(test)]
pub(crate) fn tests_payload() -> serde_json::Value {
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
            },
            {
                "id": "ev-2",
                "created_timestamp": "1700000002000",
                "message": { "conversation_id": "100-300", "sender_id": "300", "text": "other" }
            }
        ],
        "users": {
            "200": { "name": "Ada Lovelace", "profile_image_url": "https://example.com/ada.jpg" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_entries_by_conversation_id() {
        // Two entries, only one with conversation_id "100-200": exactly one
        // canonical message, attributed via the participant lookup map.
        let result = normalize(&tests_payload()).unwrap();
        assert_eq!(result.len(), 1);
        let conv = &result[0];
        assert_eq!(conv.conversation.platform_conversation_id, "100-200");
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].platform_message_id, "ev-1");
        assert_eq!(conv.messages[0].sender_name, "Ada Lovelace");
        assert_eq!(conv.messages[0].content, "hey");
        assert!(!conv.messages[0].is_outgoing);
    }

    #[test]
    fn missing_user_falls_back_to_placeholder() {
        let payload = serde_json::json!({
            "conversations": [{ "conversation_id": "c1", "participant_id": "999" }],
            "entries": [{
                "id": "e1",
                "created_timestamp": "1700000000000",
                "message": { "conversation_id": "c1", "sender_id": "999", "text": "hi" }
            }],
            "users": {}
        });
        let result = normalize(&payload).unwrap();
        assert_eq!(result[0].conversation.participant_name, "Unknown");
        assert_eq!(result[0].messages[0].sender_name, "Unknown");
    }

    #[test]
    fn own_messages_are_marked_outgoing() {
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
        let result = normalize(&payload).unwrap();
        assert!(result[0].messages[0].is_outgoing);
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let payload = serde_json::json!({
            "conversations": [{ "conversation_id": "c1", "participant_id": "200" }],
            "entries": [
                { "garbage": true },
                {
                    "id": "e2",
                    "created_timestamp": "1700000000000",
                    "message": { "conversation_id": "c1", "sender_id": "200", "text": "survives" }
                }
            ],
            "users": {}
        });
        let result = normalize(&payload).unwrap();
        assert_eq!(result[0].messages.len(), 1);
        assert_eq!(result[0].messages[0].content, "survives");
    }

    #[test]
    fn photo_attachment_maps_to_image() {
        let payload = serde_json::json!({
            "conversations": [{ "conversation_id": "c1", "participant_id": "200" }],
            "entries": [{
                "id": "e1",
                "created_timestamp": "1700000000000",
                "message": {
                    "conversation_id": "c1",
                    "sender_id": "200",
                    "text": "",
                    "attachment": { "type": "photo", "media_url": "https://example.com/p.jpg" }
                }
            }],
            "users": {}
        });
        let result = normalize(&payload).unwrap();
        let msg = &result[0].messages[0];
        assert_eq!(msg.message_type, MessageType::Image);
        assert_eq!(msg.media_url.as_deref(), Some("https://example.com/p.jpg"));
        assert_eq!(msg.content, "[Media]");
    }

    #[test]
    fn non_object_payload_is_validation_error() {
        let err = normalize(&serde_json::json!("nope")).unwrap_err();
        assert!(matches!(err, UniboxError::Validation { .. }));
    }
}
