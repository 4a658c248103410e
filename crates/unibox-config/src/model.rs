// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Unibox inbox aggregator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Unibox configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UniboxConfig {
    /// General inbox/service settings.
    #[serde(default)]
    pub inbox: InboxConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ingestion and retry-queue settings.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Real-time hub (HTTP/WebSocket server) settings.
    #[serde(default)]
    pub hub: HubConfig,

    /// Client reconciliation settings.
    #[serde(default)]
    pub client: ClientConfig,
}

/// General service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InboxConfig {
    /// Service display name, used in log output.
    #[serde(default = "default_inbox_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            name: default_inbox_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_inbox_name() -> String {
    "unibox".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "unibox.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Ingestion gateway and retry scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Maximum processing attempts per retry job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,

    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Interval between scheduler polls for due jobs, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Retention window for completed/failed jobs, in hours. Jobs older than
    /// this are removed by the periodic cleanup pass.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Map of platform account id -> owning user id, used to target hub
    /// fan-out. Accounts not listed fall back to the account id itself.
    #[serde(default)]
    pub account_owners: HashMap<String, String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            retention_hours: default_retention_hours(),
            account_owners: HashMap::new(),
        }
    }
}

fn default_max_attempts() -> i64 {
    3
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_backoff_cap_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_retention_hours() -> u64 {
    24
}

/// Real-time hub (HTTP/WebSocket server) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the REST API. `None` rejects all API requests
    /// (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Maximum time a WebSocket connection may remain unauthenticated before
    /// it is closed, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Static session-token map (token -> user id) for WebSocket auth.
    ///
    /// A stand-in verifier for deployments without an external credential
    /// service; real credential/session storage is out of scope.
    #[serde(default)]
    pub session_tokens: HashMap<String, String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            session_tokens: HashMap::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3080
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

/// Client reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Interval between send-status polls for a pending message, in milliseconds.
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// Total bounded wait for pending-message confirmation, in seconds.
    #[serde(default = "default_pending_window_secs")]
    pub pending_window_secs: u64,

    /// Maximum automatic reconnect attempts before requiring an explicit
    /// caller-triggered reconnect.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Base delay for reconnect backoff, in milliseconds.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Upper bound on a single reconnect delay, in milliseconds.
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            status_poll_interval_ms: default_status_poll_interval_ms(),
            pending_window_secs: default_pending_window_secs(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
        }
    }
}

fn default_status_poll_interval_ms() -> u64 {
    1_500
}

fn default_pending_window_secs() -> u64 {
    60
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_cap_ms() -> u64 {
    30_000
}
