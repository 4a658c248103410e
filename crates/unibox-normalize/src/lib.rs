// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-platform payload normalization into the canonical Unibox schema.
//!
//! `normalize` is a pure function: raw platform payload in, canonical
//! conversation/message fragments out. No I/O, deterministic — the same
//! input always yields the same output. Malformed sub-records are skipped
//! individually (logged at debug); a single bad record never discards the
//! rest of a batch. Only a payload the platform parser rejects outright
//! produces a `Validation` error.

pub mod instagram;
pub mod linkedin;
pub mod messenger;
pub mod twitter;

use unibox_core::{NormalizedConversation, Platform, UniboxError};

/// Normalize a raw platform payload into canonical fragments.
///
/// The Messenger-style payload is accessed defensively because its shape
/// varies by account type: parse failures there degrade to an empty result
/// for the sync rather than an error.
pub fn normalize(
    platform: Platform,
    raw: &serde_json::Value,
) -> Result<Vec<NormalizedConversation>, UniboxError> {
    match platform {
        Platform::Instagram => instagram::normalize(raw),
        Platform::Twitter => twitter::normalize(raw),
        Platform::Linkedin => linkedin::normalize(raw),
        Platform::Messenger => Ok(messenger::normalize(raw)),
    }
}

/// Parse an epoch-milliseconds timestamp that may arrive as a JSON number or
/// a decimal string (Twitter sends `created_timestamp` as a string).
pub(crate) fn epoch_ms(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
