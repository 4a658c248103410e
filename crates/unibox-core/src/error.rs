// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the ingestion pipeline.
//!
//! The ingestion gateway classifies every underlying failure into one of
//! these variants before deciding retry vs. drop: `Transient` (and the
//! transient-classified ambient variants) feeds the retry scheduler,
//! `Validation` is logged and dropped, `AuthExpired` is surfaced as a
//! distinct outcome so the caller can prompt re-authentication.

use thiserror::Error;

use crate::types::Platform;

/// The primary error type used across all Unibox crates.
#[derive(Debug, Error)]
pub enum UniboxError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed or unparseable platform payload. Never retried.
    #[error("validation error for {platform}: {message}")]
    Validation { platform: Platform, message: String },

    /// Network-timeout / 5xx-equivalent failure. Retryable via the scheduler.
    #[error("transient ingestion error: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Platform credential rejected. Surfaced so the caller can re-authenticate
    /// instead of blindly retrying.
    #[error("credentials expired for {platform} account {account_id}")]
    AuthExpired {
        platform: Platform,
        account_id: String,
    },

    /// A retry job exhausted its attempt budget and requires manual intervention.
    #[error("retry job {job_id} exhausted its attempts")]
    ExhaustedRetries { job_id: i64 },

    /// Real-time hub errors (bind failure, serialization).
    #[error("hub error: {message}")]
    Hub {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl UniboxError {
    /// Whether this error should be re-attempted through the retry scheduler.
    ///
    /// Storage and timeout failures count as transient: the payload itself is
    /// fine and a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UniboxError::Transient { .. }
                | UniboxError::Storage { .. }
                | UniboxError::Timeout { .. }
        )
    }
}
