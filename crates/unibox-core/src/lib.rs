// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Unibox inbox aggregator.
//!
//! This crate provides the canonical data model, the error taxonomy, the
//! real-time event types, and the trait seams shared by every crate in the
//! workspace. It has no I/O of its own.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::UniboxError;
pub use events::HubEvent;
pub use traits::{HubNotifier, IngestHandler, SendStatusProbe};
pub use types::{
    Conversation, ConversationFragment, IngestOutcome, Message, MessageFragment, MessageType,
    NormalizedConversation, Platform, RetryJob, RetryJobState, SendStatus,
};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn platform_round_trips_through_display() {
        let variants = [
            Platform::Instagram,
            Platform::Twitter,
            Platform::Linkedin,
            Platform::Messenger,
        ];
        for variant in &variants {
            let s = variant.to_string();
            let parsed = Platform::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
        assert_eq!(Platform::Instagram.to_string(), "instagram");
    }

    #[test]
    fn message_type_serializes_lowercase() {
        let json = serde_json::to_string(&MessageType::Image).unwrap();
        assert_eq!(json, "\"image\"");
        let parsed: MessageType = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(parsed, MessageType::File);
    }

    #[test]
    fn retry_job_state_round_trips() {
        for state in [
            RetryJobState::Waiting,
            RetryJobState::Active,
            RetryJobState::Completed,
            RetryJobState::Failed,
        ] {
            let s = state.to_string();
            assert_eq!(RetryJobState::from_str(&s).unwrap(), state);
        }
    }

    #[test]
    fn transient_classification() {
        assert!(UniboxError::Transient {
            message: "timeout".into(),
            source: None,
        }
        .is_transient());
        assert!(UniboxError::Storage {
            source: Box::new(std::io::Error::other("disk")),
        }
        .is_transient());
        assert!(!UniboxError::Validation {
            platform: Platform::Twitter,
            message: "bad payload".into(),
        }
        .is_transient());
        assert!(!UniboxError::AuthExpired {
            platform: Platform::Instagram,
            account_id: "acc-1".into(),
        }
        .is_transient());
    }
}
