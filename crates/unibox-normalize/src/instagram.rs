// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instagram-style payload normalization.
//!
//! Thread items carry many mutually exclusive content variants, modeled as a
//! closed tagged union on `item_type`. Every variant maps to either its own
//! text or a documented human-readable fallback string — never an empty
//! string. Timestamps arrive as microsecond epochs and are divided by 1000.

use serde::Deserialize;
use tracing::debug;

use unibox_core::{
    ConversationFragment, MessageFragment, MessageType, NormalizedConversation, Platform,
    UniboxError,
};

#[derive(Debug, Deserialize)]
struct InstagramPayload {
    inbox: InstagramInbox,
    #[serde(default)]
    viewer_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct InstagramInbox {
    threads: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct InstagramThread {
    thread_id: String,
    #[serde(default)]
    users: Vec<InstagramUser>,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct InstagramUser {
    pk: i64,
    #[serde(default)]
    username: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    profile_pic_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstagramItem {
    item_id: String,
    user_id: i64,
    /// Microsecond epoch. Divided by 1000 to get milliseconds.
    timestamp: i64,
    #[serde(flatten)]
    body: ItemBody,
}

/// The mutually exclusive content variants an Instagram thread item can carry.
///
/// Closed union on `item_type`: an unrecognized variant fails to parse and the
/// item is skipped individually, never aborting the batch.
#[derive(Debug, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
enum ItemBody {
    Text {
        text: String,
    },
    Link {
        link: LinkBody,
    },
    ReelShare {
        reel_share: ShareBody,
    },
    MediaShare {
        #[serde(default)]
        media_share: Option<serde_json::Value>,
    },
    Clip {
        #[serde(default)]
        clip: Option<serde_json::Value>,
    },
    VoiceMedia {
        #[serde(default)]
        voice_media: Option<VoiceBody>,
    },
    Media {
        media: MediaBody,
    },
    AnimatedMedia {
        #[serde(default)]
        animated_media: Option<AnimatedBody>,
    },
    Like {
        #[serde(default)]
        like: Option<String>,
    },
    Placeholder,
    ActionLog {
        #[serde(default)]
        action_log: Option<ActionLogBody>,
    },
}

#[derive(Debug, Deserialize)]
struct LinkBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    link_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShareBody {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct VoiceBody {
    #[serde(default)]
    audio_src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaBody {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnimatedBody {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionLogBody {
    #[serde(default)]
    description: String,
}

/// Normalize an Instagram-style payload.
pub fn normalize(raw: &serde_json::Value) -> Result<Vec<NormalizedConversation>, UniboxError> {
    let payload: InstagramPayload =
        serde_json::from_value(raw.clone()).map_err(|e| UniboxError::Validation {
            platform: Platform::Instagram,
            message: format!("unparseable instagram payload: {e}"),
        })?;

    let mut result = Vec::new();
    for thread_value in &payload.inbox.threads {
        let thread: InstagramThread = match serde_json::from_value(thread_value.clone()) {
            Ok(t) => t,
            Err(e) => {
                debug!(error = %e, "instagram: skipping malformed thread");
                continue;
            }
        };

        // The counterpart is the first thread user who isn't the viewer.
        let participant = thread
            .users
            .iter()
            .find(|u| Some(u.pk) != payload.viewer_id)
            .or(thread.users.first());

        let fragment = ConversationFragment {
            platform_conversation_id: thread.thread_id.clone(),
            participant_id: participant.map(|u| u.pk.to_string()).unwrap_or_default(),
            participant_name: participant
                .map(|u| display_name(u))
                .unwrap_or_else(|| "Unknown".to_string()),
            participant_avatar: participant.and_then(|u| u.profile_pic_url.clone()),
        };

        let messages = thread
            .items
            .iter()
            .filter_map(|value| {
                let item: InstagramItem = match serde_json::from_value(value.clone()) {
                    Ok(i) => i,
                    Err(e) => {
                        debug!(error = %e, "instagram: skipping malformed item");
                        return None;
                    }
                };
                Some(to_message(&item, &thread, payload.viewer_id))
            })
            .collect();

        result.push(NormalizedConversation {
            conversation: fragment,
            messages,
        });
    }

    Ok(result)
}

fn display_name(user: &InstagramUser) -> String {
    if !user.full_name.is_empty() {
        user.full_name.clone()
    } else if !user.username.is_empty() {
        user.username.clone()
    } else {
        "Unknown".to_string()
    }
}

fn to_message(item: &InstagramItem, thread: &InstagramThread, viewer_id: Option<i64>) -> MessageFragment {
    let (content, message_type, media_url) = resolve_variant(&item.body);
    let sender = thread.users.iter().find(|u| u.pk == item.user_id);

    MessageFragment {
        platform_message_id: item.item_id.clone(),
        sender_id: item.user_id.to_string(),
        sender_name: sender.map(display_name).unwrap_or_else(|| "Unknown".to_string()),
        content,
        message_type,
        media_url,
        is_outgoing: Some(item.user_id) == viewer_id,
        // Instagram timestamps are microseconds.
        sent_at: item.timestamp / 1000,
        delivered_at: None,
    }
}

/// One adapter arm per variant. Every arm yields non-empty content: variants
/// without their own text map to a documented fallback string.
fn resolve_variant(body: &ItemBody) -> (String, MessageType, Option<String>) {
    match body {
        ItemBody::Text { text } => {
            let content = if text.is_empty() {
                "[Unsupported]".to_string()
            } else {
                text.clone()
            };
            (content, MessageType::Text, None)
        }
        ItemBody::Link { link } => {
            let content = if link.text.is_empty() {
                "[Shared a Link]".to_string()
            } else {
                link.text.clone()
            };
            (content, MessageType::Text, link.link_url.clone())
        }
        ItemBody::ReelShare { reel_share } => {
            let content = if reel_share.text.is_empty() {
                "[Shared a Reel]".to_string()
            } else {
                reel_share.text.clone()
            };
            (content, MessageType::Text, None)
        }
        ItemBody::MediaShare { .. } => ("[Shared a Post]".to_string(), MessageType::Text, None),
        ItemBody::Clip { .. } => ("[Shared a Clip]".to_string(), MessageType::Text, None),
        ItemBody::VoiceMedia { voice_media } => (
            "[Voice Message]".to_string(),
            MessageType::File,
            voice_media.as_ref().and_then(|v| v.audio_src.clone()),
        ),
        ItemBody::Media { media } => {
            if let Some(video) = &media.video_url {
                ("[Video]".to_string(), MessageType::Video, Some(video.clone()))
            } else {
                (
                    "[Photo]".to_string(),
                    MessageType::Image,
                    media.image_url.clone(),
                )
            }
        }
        ItemBody::AnimatedMedia { animated_media } => (
            "[GIF]".to_string(),
            MessageType::Image,
            animated_media.as_ref().and_then(|a| a.url.clone()),
        ),
        ItemBody::Like { like } => {
            let content = match like {
                Some(text) if !text.is_empty() => text.clone(),
                _ => "\u{2764}\u{fe0f}".to_string(),
            };
            (content, MessageType::Text, None)
        }
        ItemBody::Placeholder => ("[Unavailable]".to_string(), MessageType::Text, None),
        ItemBody::ActionLog { action_log } => {
            let content = match action_log {
                Some(log) if !log.description.is_empty() => log.description.clone(),
                _ => "[Activity]".to_string(),
            };
            (content, MessageType::Text, None)
        }
    }
}

#[cfg(test)]
pub(crate) fn tests_payload() -> serde_json::Value {
    serde_json::json!({
        "viewer_id": 999,
        "inbox": {
            "threads": [{
                "thread_id": "t-1",
                "users": [
                    { "pk": 123, "username": "ada", "full_name": "Ada Lovelace" },
                    { "pk": 999, "username": "me", "full_name": "Me" }
                ],
                "items": [
                    {
                        "item_id": "i-1",
                        "user_id": 123,
                        "timestamp": 1_700_000_000_000_000i64,
                        "item_type": "text",
                        "text": "hello there"
                    },
                    {
                        "item_id": "i-2",
                        "user_id": 123,
                        "timestamp": 1_700_000_001_000_000i64,
                        "item_type": "reel_share",
                        "reel_share": { "text": "hi" }
                    }
                ]
            }]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(item_type: &str, extra: serde_json::Value) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "item_id": "i-x",
            "user_id": 123,
            "timestamp": 1_700_000_000_000_000i64,
            "item_type": item_type
        });
        if let (Some(base), Some(extra)) = (obj.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        obj
    }

    fn payload_with_items(items: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({
            "viewer_id": 999,
            "inbox": { "threads": [{
                "thread_id": "t-1",
                "users": [{ "pk": 123, "username": "ada", "full_name": "Ada" }],
                "items": items
            }]}
        })
    }

    fn single_content(items: Vec<serde_json::Value>) -> (String, MessageType, Option<String>) {
        let result = normalize(&payload_with_items(items)).unwrap();
        let msg = &result[0].messages[0];
        (msg.content.clone(), msg.message_type, msg.media_url.clone())
    }

    #[test]
    fn reel_share_with_text_uses_text_not_fallback() {
        let (content, _, _) =
            single_content(vec![item("reel_share", serde_json::json!({ "reel_share": { "text": "hi" } }))]);
        assert_eq!(content, "hi");
    }

    #[test]
    fn reel_share_without_text_uses_fallback() {
        let (content, _, _) =
            single_content(vec![item("reel_share", serde_json::json!({ "reel_share": { "text": "" } }))]);
        assert_eq!(content, "[Shared a Reel]");
    }

    #[test]
    fn media_share_maps_to_post_fallback() {
        let (content, _, _) = single_content(vec![item("media_share", serde_json::json!({}))]);
        assert_eq!(content, "[Shared a Post]");
    }

    #[test]
    fn voice_media_maps_to_file_with_audio_url() {
        let (content, message_type, media_url) = single_content(vec![item(
            "voice_media",
            serde_json::json!({ "voice_media": { "audio_src": "https://example.com/v.mp4" } }),
        )]);
        assert_eq!(content, "[Voice Message]");
        assert_eq!(message_type, MessageType::File);
        assert_eq!(media_url.as_deref(), Some("https://example.com/v.mp4"));
    }

    #[test]
    fn like_defaults_to_heart() {
        let (content, _, _) = single_content(vec![item("like", serde_json::json!({}))]);
        assert_eq!(content, "\u{2764}\u{fe0f}");
    }

    #[test]
    fn no_variant_yields_empty_content() {
        // Every variant arm must produce a non-empty string.
        let variants = vec![
            item("text", serde_json::json!({ "text": "" })),
            item("link", serde_json::json!({ "link": {} })),
            item("reel_share", serde_json::json!({ "reel_share": {} })),
            item("media_share", serde_json::json!({})),
            item("clip", serde_json::json!({})),
            item("voice_media", serde_json::json!({})),
            item("media", serde_json::json!({ "media": {} })),
            item("animated_media", serde_json::json!({})),
            item("like", serde_json::json!({})),
            item("placeholder", serde_json::json!({})),
            item("action_log", serde_json::json!({})),
        ];
        let count = variants.len();
        let result = normalize(&payload_with_items(variants)).unwrap();
        assert_eq!(result[0].messages.len(), count);
        for msg in &result[0].messages {
            assert!(!msg.content.is_empty(), "variant produced empty content");
        }
    }

    #[test]
    fn microsecond_timestamps_are_scaled_to_millis() {
        let result = normalize(&tests_payload()).unwrap();
        assert_eq!(result[0].messages[0].sent_at, 1_700_000_000_000);
    }

    #[test]
    fn unknown_item_type_is_skipped_not_fatal() {
        let items = vec![
            item("hologram", serde_json::json!({})),
            item("text", serde_json::json!({ "text": "kept" })),
        ];
        let result = normalize(&payload_with_items(items)).unwrap();
        assert_eq!(result[0].messages.len(), 1);
        assert_eq!(result[0].messages[0].content, "kept");
    }

    #[test]
    fn viewer_messages_are_outgoing() {
        let result = normalize(&tests_payload()).unwrap();
        assert!(result[0].messages.iter().all(|m| !m.is_outgoing));
        assert_eq!(result[0].conversation.participant_name, "Ada Lovelace");
    }
}
