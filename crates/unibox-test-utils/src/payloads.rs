// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned platform payloads in each sync collaborator's wire shape.
//!
//! Each builder produces one conversation with one incoming text message,
//! parameterized just enough for dedup and fan-out assertions.

use serde_json::{json, Value};

/// Twitter-style payload: flat entry list plus a users side-table.
pub fn twitter_payload(conversation_id: &str, message_id: &str, text: &str) -> Value {
    json!({
        "self_user_id": "100",
        "conversations": [
            { "conversation_id": conversation_id, "participant_id": "200" }
        ],
        "entries": [
            {
                "id": message_id,
                "created_timestamp": "1700000001000",
                "message": {
                    "conversation_id": conversation_id,
                    "sender_id": "200",
                    "text": text
                }
            }
        ],
        "users": {
            "200": { "name": "Ada Lovelace", "profile_image_url": "https://pbs.example/ada.jpg" }
        }
    })
}

/// Instagram-style payload: inbox threads with typed items and
/// microsecond timestamps.
pub fn instagram_payload(thread_id: &str, item_id: &str, text: &str) -> Value {
    json!({
        "viewer_id": 100,
        "inbox": {
            "threads": [
                {
                    "thread_id": thread_id,
                    "users": [
                        { "pk": 200, "username": "ada", "full_name": "Ada Lovelace" }
                    ],
                    "items": [
                        {
                            "item_id": item_id,
                            "user_id": 200,
                            "timestamp": 1_700_000_001_000_000_i64,
                            "item_type": "text",
                            "text": text
                        }
                    ]
                }
            ]
        }
    })
}

/// LinkedIn-style payload: element list with an `included` side-table of
/// profiles and events referenced by URN.
pub fn linkedin_payload(conversation_urn: &str, event_urn: &str, text: &str) -> Value {
    json!({
        "viewer_urn": "urn:li:fs_miniProfile:viewer",
        "elements": [
            {
                "entity_urn": conversation_urn,
                "participants": ["urn:li:fs_miniProfile:ada"],
                "events": [event_urn]
            }
        ],
        "included": [
            {
                "$type": "profile",
                "entity_urn": "urn:li:fs_miniProfile:ada",
                "first_name": "Ada",
                "last_name": "Lovelace"
            },
            {
                "$type": "event",
                "entity_urn": event_urn,
                "from": "urn:li:fs_miniProfile:ada",
                "body": { "text": text },
                "created_at": 1_700_000_001_000_i64
            }
        ]
    })
}

/// Messenger-style payload: deeply nested viewer tree with decimal-string
/// timestamps.
pub fn messenger_payload(thread_fbid: &str, message_id: &str, text: &str) -> Value {
    json!({
        "viewer": {
            "id": "100",
            "message_threads": {
                "nodes": [
                    {
                        "thread_key": { "thread_fbid": thread_fbid },
                        "all_participants": {
                            "nodes": [
                                {
                                    "messaging_actor": {
                                        "id": "200",
                                        "name": "Ada Lovelace"
                                    }
                                }
                            ]
                        },
                        "messages": {
                            "nodes": [
                                {
                                    "message_id": message_id,
                                    "message_sender": { "id": "200", "name": "Ada Lovelace" },
                                    "snippet": text,
                                    "timestamp_precise": "1700000001000"
                                }
                            ]
                        }
                    }
                ]
            }
        }
    })
}

/// A platform error body as forwarded by a sync collaborator.
pub fn error_payload(code: i64, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message } })
}
