// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger-style payload normalization.
//!
//! This platform's response tree varies by account type, so every level is
//! accessed through `Option`s. A parse failure degrades to an empty result
//! for the sync instead of aborting the whole ingestion batch.

use serde::Deserialize;
use tracing::{debug, warn};

use unibox_core::{
    ConversationFragment, MessageFragment, MessageType, NormalizedConversation,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerPayload {
    viewer: Option<MessengerViewer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerViewer {
    id: Option<String>,
    message_threads: Option<MessengerThreads>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerThreads {
    nodes: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerThread {
    thread_key: Option<MessengerThreadKey>,
    all_participants: Option<MessengerParticipants>,
    messages: Option<MessengerMessages>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerThreadKey {
    thread_fbid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerParticipants {
    nodes: Vec<MessengerParticipantNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerParticipantNode {
    messaging_actor: Option<MessengerActor>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct MessengerActor {
    id: Option<String>,
    name: Option<String>,
    profile_picture: Option<MessengerPicture>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct MessengerPicture {
    uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerMessages {
    nodes: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerMessage {
    message_id: Option<String>,
    message_sender: Option<MessengerActor>,
    snippet: Option<String>,
    /// Epoch milliseconds as a decimal string.
    timestamp_precise: Option<String>,
    blob_attachments: Vec<MessengerAttachment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessengerAttachment {
    typename: Option<String>,
    playable_url: Option<String>,
    preview_url: Option<String>,
}

/// Normalize a Messenger-style payload.
///
/// Infallible by contract: any shape mismatch yields an empty result for
/// this sync.
pub fn normalize(raw: &serde_json::Value) -> Vec<NormalizedConversation> {
    let payload: MessengerPayload = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "messenger: unparseable payload, degrading to empty sync");
            return Vec::new();
        }
    };

    let Some(viewer) = payload.viewer else {
        debug!("messenger: payload has no viewer node");
        return Vec::new();
    };
    let viewer_id = viewer.id.clone();
    let Some(threads) = viewer.message_threads else {
        debug!("messenger: payload has no message_threads node");
        return Vec::new();
    };

    let mut result = Vec::new();
    for node in &threads.nodes {
        let thread: MessengerThread = match serde_json::from_value(node.clone()) {
            Ok(t) => t,
            Err(e) => {
                debug!(error = %e, "messenger: skipping malformed thread node");
                continue;
            }
        };
        if let Some(conv) = to_conversation(&thread, viewer_id.as_deref()) {
            result.push(conv);
        }
    }

    result
}

fn to_conversation(
    thread: &MessengerThread,
    viewer_id: Option<&str>,
) -> Option<NormalizedConversation> {
    let thread_id = thread
        .thread_key
        .as_ref()
        .and_then(|k| k.thread_fbid.clone())?;

    let participant = thread
        .all_participants
        .as_ref()
        .map(|p| p.nodes.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|n| n.messaging_actor.as_ref())
        .find(|actor| actor.id.as_deref() != viewer_id);

    let fragment = ConversationFragment {
        platform_conversation_id: thread_id,
        participant_id: participant
            .and_then(|a| a.id.clone())
            .unwrap_or_default(),
        participant_name: participant
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        participant_avatar: participant
            .and_then(|a| a.profile_picture.as_ref())
            .and_then(|p| p.uri.clone()),
    };

    let messages = thread
        .messages
        .as_ref()
        .map(|m| m.nodes.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|node| {
            let msg: MessengerMessage = match serde_json::from_value(node.clone()) {
                Ok(m) => m,
                Err(e) => {
                    debug!(error = %e, "messenger: skipping malformed message node");
                    return None;
                }
            };
            to_message(&msg, viewer_id)
        })
        .collect();

    Some(NormalizedConversation {
        conversation: fragment,
        messages,
    })
}

fn to_message(msg: &MessengerMessage, viewer_id: Option<&str>) -> Option<MessageFragment> {
    let message_id = msg.message_id.clone()?;
    let sent_at: i64 = msg.timestamp_precise.as_ref()?.parse().ok()?;
    let sender = msg.message_sender.as_ref();
    let sender_id = sender.and_then(|s| s.id.clone()).unwrap_or_default();

    let attachment = msg.blob_attachments.first();
    let (content, message_type, media_url) = match (&msg.snippet, attachment) {
        (Some(text), _) if !text.is_empty() => (text.clone(), MessageType::Text, None),
        (_, Some(att)) => {
            let url = att.playable_url.clone().or_else(|| att.preview_url.clone());
            match att.typename.as_deref() {
                Some("MessageImage") => ("[Photo]".to_string(), MessageType::Image, url),
                Some("MessageVideo") => ("[Video]".to_string(), MessageType::Video, url),
                _ => ("[Attachment]".to_string(), MessageType::File, url),
            }
        }
        _ => ("[Unsupported]".to_string(), MessageType::Text, None),
    };

    Some(MessageFragment {
        platform_message_id: message_id,
        sender_id: sender_id.clone(),
        sender_name: sender
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        content,
        message_type,
        media_url,
        is_outgoing: viewer_id.is_some() && viewer_id == Some(sender_id.as_str()),
        sent_at,
        delivered_at: None,
    })
}

#[cfg(test)]
pub(crate) fn tests_payload() -> serde_json::Value {
    serde_json::json!({
        "viewer": {
            "id": "me-1",
            "message_threads": {
                "nodes": [{
                    "thread_key": { "thread_fbid": "fb-1" },
                    "all_participants": { "nodes": [
                        { "messaging_actor": { "id": "me-1", "name": "Me" } },
                        { "messaging_actor": {
                            "id": "ada-1",
                            "name": "Ada Lovelace",
                            "profile_picture": { "uri": "https://example.com/ada.jpg" }
                        }}
                    ]},
                    "messages": { "nodes": [{
                        "message_id": "m-1",
                        "message_sender": { "id": "ada-1", "name": "Ada Lovelace" },
                        "snippet": "hello",
                        "timestamp_precise": "1700000000000"
                    }]}
                }]
            }
        }
    })
}
