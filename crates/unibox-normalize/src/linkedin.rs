// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LinkedIn-style payload normalization.
//!
//! The payload is a primary conversation list plus an `included` side-table
//! of related entities. Lookup maps (id -> profile, id -> event) are built
//! from the side-table first, then each conversation's participants and
//! messages are resolved through them: a reference may appear either as a
//! bare id string or as a nested object using one of two field layouts
//! (legacy `mini_profile` vs alternate `profile`) for the same concept.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use unibox_core::{
    ConversationFragment, MessageFragment, MessageType, NormalizedConversation, Platform,
    UniboxError,
};

#[derive(Debug, Deserialize)]
struct LinkedinPayload {
    elements: Vec<serde_json::Value>,
    #[serde(default)]
    included: Vec<serde_json::Value>,
    #[serde(default)]
    viewer_urn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkedinConversation {
    entity_urn: String,
    #[serde(default)]
    participants: Vec<ParticipantRef>,
    #[serde(default)]
    events: Vec<EventRef>,
}

/// A participant reference: a bare URN, or an inline profile in either the
/// legacy or the alternate layout.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParticipantRef {
    Urn(String),
    Legacy { mini_profile: ProfileBody },
    Alternate { profile: ProfileBody },
}

/// An event reference: a bare URN or an inline event object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventRef {
    Urn(String),
    Inline(EventBody),
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileBody {
    entity_urn: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    picture_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventBody {
    entity_urn: String,
    from: String,
    #[serde(default)]
    body: Option<TextBody>,
    /// Alternate layout for the same concept as `body`.
    #[serde(default)]
    attributed_body: Option<TextBody>,
    created_at: i64,
    #[serde(default)]
    attachment_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextBody {
    #[serde(default)]
    text: String,
}

/// Side-table entity, discriminated by `$type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "$type", rename_all = "lowercase")]
enum IncludedEntity {
    Profile(ProfileBody),
    Event(EventBody),
}

/// Normalize a LinkedIn-style payload.
pub fn normalize(raw: &serde_json::Value) -> Result<Vec<NormalizedConversation>, UniboxError> {
    let payload: LinkedinPayload =
        serde_json::from_value(raw.clone()).map_err(|e| UniboxError::Validation {
            platform: Platform::Linkedin,
            message: format!("unparseable linkedin payload: {e}"),
        })?;

    // Build lookup maps from the side-table before touching the primary list.
    let mut profiles: HashMap<String, ProfileBody> = HashMap::new();
    let mut events: HashMap<String, EventBody> = HashMap::new();
    for value in &payload.included {
        match serde_json::from_value::<IncludedEntity>(value.clone()) {
            Ok(IncludedEntity::Profile(p)) => {
                profiles.insert(p.entity_urn.clone(), p);
            }
            Ok(IncludedEntity::Event(e)) => {
                events.insert(e.entity_urn.clone(), e);
            }
            Err(e) => debug!(error = %e, "linkedin: skipping malformed included entity"),
        }
    }

    let mut result = Vec::new();
    for element in &payload.elements {
        let conv: LinkedinConversation = match serde_json::from_value(element.clone()) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "linkedin: skipping malformed conversation");
                continue;
            }
        };

        // Resolve the counterpart participant through the lookup map.
        let participant = conv
            .participants
            .iter()
            .filter_map(|p| resolve_participant(p, &profiles))
            .find(|p| Some(p.entity_urn.as_str()) != payload.viewer_urn.as_deref());

        let fragment = ConversationFragment {
            platform_conversation_id: conv.entity_urn.clone(),
            participant_id: participant
                .as_ref()
                .map(|p| p.entity_urn.clone())
                .unwrap_or_default(),
            participant_name: participant
                .as_ref()
                .map(full_name)
                .unwrap_or_else(|| "Unknown".to_string()),
            participant_avatar: participant.as_ref().and_then(|p| p.picture_url.clone()),
        };

        let messages = conv
            .events
            .iter()
            .filter_map(|event_ref| resolve_event(event_ref, &events))
            .filter_map(|event| to_message(&event, &profiles, payload.viewer_urn.as_deref()))
            .collect();

        result.push(NormalizedConversation {
            conversation: fragment,
            messages,
        });
    }

    Ok(result)
}

fn resolve_participant(p: &ParticipantRef, profiles: &HashMap<String, ProfileBody>) -> Option<ProfileBody> {
    match p {
        ParticipantRef::Urn(urn) => profiles.get(urn).cloned(),
        ParticipantRef::Legacy { mini_profile } => Some(mini_profile.clone()),
        ParticipantRef::Alternate { profile } => Some(profile.clone()),
    }
}

fn resolve_event(e: &EventRef, events: &HashMap<String, EventBody>) -> Option<EventBody> {
    match e {
        EventRef::Urn(urn) => events.get(urn).cloned(),
        EventRef::Inline(body) => Some(body.clone()),
    }
}

fn to_message(
    event: &EventBody,
    profiles: &HashMap<String, ProfileBody>,
    viewer_urn: Option<&str>,
) -> Option<MessageFragment> {
    // `body` and `attributed_body` are two layouts for the same concept.
    let text = event
        .body
        .as_ref()
        .or(event.attributed_body.as_ref())
        .map(|b| b.text.clone())
        .filter(|t| !t.is_empty());

    let (content, message_type) = match (&text, &event.attachment_url) {
        (Some(t), _) => (t.clone(), MessageType::Text),
        (None, Some(_)) => ("[Attachment]".to_string(), MessageType::File),
        (None, None) => {
            debug!(event_urn = %event.entity_urn, "linkedin: skipping event without content");
            return None;
        }
    };

    let sender = profiles.get(&event.from);

    Some(MessageFragment {
        platform_message_id: event.entity_urn.clone(),
        sender_id: event.from.clone(),
        sender_name: sender.map(full_name).unwrap_or_else(|| "Unknown".to_string()),
        content,
        message_type,
        media_url: event.attachment_url.clone(),
        is_outgoing: viewer_urn == Some(event.from.as_str()),
        sent_at: event.created_at,
        delivered_at: None,
    })
}

fn full_name(p: &ProfileBody) -> String {
    let name = format!("{} {}", p.first_name, p.last_name);
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
pub(crate) fn tests_payload() -> serde_json::Value {
    serde_json::json!({
        "viewer_urn": "urn:li:member:me",
        "elements": [{
            "entity_urn": "urn:li:conversation:c1",
            "participants": ["urn:li:member:ada"],
            "events": ["urn:li:event:e1", "urn:li:event:e2"]
        }],
        "included": [
            {
                "$type": "profile",
                "entity_urn": "urn:li:member:ada",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "picture_url": "https://example.com/ada.jpg"
            },
            {
                "$type": "event",
                "entity_urn": "urn:li:event:e1",
                "from": "urn:li:member:ada",
                "body": { "text": "hello" },
                "created_at": 1_700_000_000_000i64
            },
            {
                "$type": "event",
                "entity_urn": "urn:li:event:e2",
                "from": "urn:li:member:me",
                "attributed_body": { "text": "hi back" },
                "created_at": 1_700_000_001_000i64
            }
        ]
    })
}
