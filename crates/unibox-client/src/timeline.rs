// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation timeline reconciliation.
//!
//! A timeline merges three inputs into one ascending-by-`sent_at` view:
//! paginated history from the pull API (authoritative, arrives newest
//! first), optimistic entries for sends awaiting confirmation, and streamed
//! `new_message` / `message_status_update` events. Every entry is
//! explicitly either [`TimelineEntry::Confirmed`] or
//! [`TimelineEntry::Pending`], so render code matches on the variant
//! instead of probing sentinel fields.
//!
//! Streamed events append at the tail without re-sorting. The hub emits
//! them in store order, so arrival order approximates `sent_at` order well
//! enough for a live view; the next history refresh restores the exact
//! ordering.

use unibox_core::types::Message;

/// An optimistic entry for a send that has not been confirmed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    /// Client-generated identifier, also used to poll send status.
    pub temp_id: String,
    pub conversation_id: String,
    pub content: String,
    /// Epoch milliseconds at the moment the user hit send.
    pub sent_at: i64,
}

/// One entry in a conversation timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    /// Canonical, store-backed message.
    Confirmed(Message),
    /// Optimistic placeholder awaiting confirmation.
    Pending(PendingMessage),
}

impl TimelineEntry {
    /// Display ordering key.
    pub fn sent_at(&self) -> i64 {
        match self {
            TimelineEntry::Confirmed(m) => m.sent_at,
            TimelineEntry::Pending(p) => p.sent_at,
        }
    }
}

/// The merged view of one conversation.
#[derive(Debug, Default)]
pub struct Timeline {
    conversation_id: String,
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Entries in ascending display order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the confirmed portion with an authoritative history page.
    ///
    /// `page` arrives newest first (the pull API's order) and is reversed
    /// here. Pending entries survive the refresh unless the page already
    /// contains their confirmed counterpart, matched by content within this
    /// conversation.
    pub fn load_history(&mut self, page: Vec<Message>) {
        let pending: Vec<PendingMessage> = self
            .entries
            .drain(..)
            .filter_map(|e| match e {
                TimelineEntry::Pending(p) => Some(p),
                TimelineEntry::Confirmed(_) => None,
            })
            .collect();

        self.entries = page
            .into_iter()
            .rev()
            .map(TimelineEntry::Confirmed)
            .collect();

        for p in pending {
            let confirmed_elsewhere = self.entries.iter().any(|e| {
                matches!(e, TimelineEntry::Confirmed(m)
                    if m.is_outgoing && m.content == p.content)
            });
            if !confirmed_elsewhere {
                self.entries.push(TimelineEntry::Pending(p));
            }
        }
    }

    /// Append an optimistic entry for a just-sent message.
    pub fn add_pending(&mut self, pending: PendingMessage) {
        self.entries.push(TimelineEntry::Pending(pending));
    }

    /// Apply a streamed `new_message` event.
    ///
    /// Dedup rules, in order: a confirmed entry with the same id is
    /// replaced in place (the event carries fresher status fields); an
    /// outgoing message matching a pending placeholder's content replaces
    /// that placeholder in place; otherwise the message appends at the
    /// tail.
    pub fn apply_new_message(&mut self, message: Message) {
        if let Some(entry) = self.entries.iter_mut().find(|e| {
            matches!(e, TimelineEntry::Confirmed(m) if m.id == message.id)
        }) {
            *entry = TimelineEntry::Confirmed(message);
            return;
        }

        if message.is_outgoing {
            if let Some(entry) = self.entries.iter_mut().find(|e| {
                matches!(e, TimelineEntry::Pending(p) if p.content == message.content)
            }) {
                *entry = TimelineEntry::Confirmed(message);
                return;
            }
        }

        self.entries.push(TimelineEntry::Confirmed(message));
    }

    /// Apply a streamed `message_status_update` event. Unknown ids are
    /// ignored; the message will carry its status on the next refresh.
    pub fn apply_status_update(
        &mut self,
        message_id: &str,
        is_read: bool,
        delivered_at: Option<i64>,
    ) {
        for entry in &mut self.entries {
            if let TimelineEntry::Confirmed(m) = entry {
                if m.id == message_id {
                    m.is_read = is_read;
                    if delivered_at.is_some() {
                        m.delivered_at = delivered_at;
                    }
                    return;
                }
            }
        }
    }

    /// Replace a pending placeholder with its confirmed message. Returns
    /// false if no placeholder with that `temp_id` remains.
    pub fn confirm_pending(&mut self, temp_id: &str, message: Message) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| {
            matches!(e, TimelineEntry::Pending(p) if p.temp_id == temp_id)
        }) {
            *entry = TimelineEntry::Confirmed(message);
            true
        } else {
            false
        }
    }

    /// Remove a pending placeholder whose send failed permanently.
    pub fn drop_pending(&mut self, temp_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(
            |e| !matches!(e, TimelineEntry::Pending(p) if p.temp_id == temp_id),
        );
        self.entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unibox_core::types::MessageType;

    fn msg(id: &str, content: &str, sent_at: i64, is_outgoing: bool) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "conv-1".to_string(),
            platform_message_id: format!("pm-{id}"),
            sender_id: "s-1".to_string(),
            sender_name: "Ada".to_string(),
            content: content.to_string(),
            message_type: MessageType::Text,
            media_url: None,
            is_outgoing,
            is_read: false,
            sent_at,
            delivered_at: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn history_is_reversed_to_ascending_order() {
        let mut tl = Timeline::new("conv-1");
        tl.load_history(vec![msg("m3", "three", 30, false), msg("m1", "one", 10, false)]);
        let order: Vec<i64> = tl.entries().iter().map(|e| e.sent_at()).collect();
        assert_eq!(order, vec![10, 30]);
    }

    #[test]
    fn new_message_with_known_id_replaces_in_place() {
        let mut tl = Timeline::new("conv-1");
        tl.load_history(vec![msg("m1", "one", 10, false)]);

        let mut updated = msg("m1", "one", 10, false);
        updated.is_read = true;
        tl.apply_new_message(updated);

        assert_eq!(tl.len(), 1);
        let TimelineEntry::Confirmed(m) = &tl.entries()[0] else {
            panic!("expected confirmed entry");
        };
        assert!(m.is_read);
    }

    #[test]
    fn outgoing_event_replaces_matching_pending_placeholder() {
        let mut tl = Timeline::new("conv-1");
        tl.add_pending(PendingMessage {
            temp_id: "tmp-1".to_string(),
            conversation_id: "conv-1".to_string(),
            content: "hello".to_string(),
            sent_at: 100,
        });

        tl.apply_new_message(msg("m9", "hello", 105, true));

        assert_eq!(tl.len(), 1);
        assert!(matches!(
            &tl.entries()[0],
            TimelineEntry::Confirmed(m) if m.id == "m9"
        ));
    }

    #[test]
    fn incoming_event_never_consumes_a_placeholder() {
        let mut tl = Timeline::new("conv-1");
        tl.add_pending(PendingMessage {
            temp_id: "tmp-1".to_string(),
            conversation_id: "conv-1".to_string(),
            content: "hello".to_string(),
            sent_at: 100,
        });

        // Same content, but from the other party.
        tl.apply_new_message(msg("m9", "hello", 105, false));

        assert_eq!(tl.len(), 2);
    }

    #[test]
    fn streamed_events_append_at_the_tail() {
        let mut tl = Timeline::new("conv-1");
        tl.load_history(vec![msg("m2", "two", 20, false)]);
        // Out-of-order arrival is kept as-is until the next refresh.
        tl.apply_new_message(msg("m1", "one", 10, false));
        let ids: Vec<&str> = tl
            .entries()
            .iter()
            .map(|e| match e {
                TimelineEntry::Confirmed(m) => m.id.as_str(),
                TimelineEntry::Pending(p) => p.temp_id.as_str(),
            })
            .collect();
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[test]
    fn refresh_drops_pending_already_confirmed_in_history() {
        let mut tl = Timeline::new("conv-1");
        tl.add_pending(PendingMessage {
            temp_id: "tmp-1".to_string(),
            conversation_id: "conv-1".to_string(),
            content: "hello".to_string(),
            sent_at: 100,
        });
        tl.add_pending(PendingMessage {
            temp_id: "tmp-2".to_string(),
            conversation_id: "conv-1".to_string(),
            content: "still in flight".to_string(),
            sent_at: 110,
        });

        tl.load_history(vec![msg("m9", "hello", 105, true)]);

        assert_eq!(tl.len(), 2);
        assert!(matches!(&tl.entries()[0], TimelineEntry::Confirmed(_)));
        assert!(matches!(
            &tl.entries()[1],
            TimelineEntry::Pending(p) if p.temp_id == "tmp-2"
        ));
    }

    #[test]
    fn status_update_patches_read_and_delivered() {
        let mut tl = Timeline::new("conv-1");
        tl.load_history(vec![msg("m1", "one", 10, true)]);

        tl.apply_status_update("m1", true, Some(12));
        let TimelineEntry::Confirmed(m) = &tl.entries()[0] else {
            panic!("expected confirmed entry");
        };
        assert!(m.is_read);
        assert_eq!(m.delivered_at, Some(12));

        // A later update without a delivered timestamp keeps the old one.
        tl.apply_status_update("m1", true, None);
        let TimelineEntry::Confirmed(m) = &tl.entries()[0] else {
            panic!("expected confirmed entry");
        };
        assert_eq!(m.delivered_at, Some(12));
    }

    #[test]
    fn confirm_and_drop_pending() {
        let mut tl = Timeline::new("conv-1");
        tl.add_pending(PendingMessage {
            temp_id: "tmp-1".to_string(),
            conversation_id: "conv-1".to_string(),
            content: "hello".to_string(),
            sent_at: 100,
        });

        assert!(tl.confirm_pending("tmp-1", msg("m9", "hello", 105, true)));
        assert!(!tl.confirm_pending("tmp-1", msg("m9", "hello", 105, true)));
        assert!(!tl.drop_pending("tmp-1"));
        assert_eq!(tl.len(), 1);
    }
}
