// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, non-empty paths, and sane
//! retry/backoff bounds. Collects all errors rather than failing fast.

use crate::diagnostic::ConfigError;
use crate::model::UniboxConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// every collected validation error.
pub fn validate_config(config: &UniboxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Hub bind address must be non-empty and look like an IP or hostname.
    let addr = config.hub.host.trim();
    if addr.is_empty() {
        errors.push(ConfigError::Validation {
            message: "hub.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("hub.host `{addr}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.ingest.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "ingest.max_attempts must be at least 1, got {}",
                config.ingest.max_attempts
            ),
        });
    }

    if config.ingest.backoff_base_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "ingest.backoff_base_ms must be greater than zero".to_string(),
        });
    }

    if config.ingest.backoff_cap_ms < config.ingest.backoff_base_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "ingest.backoff_cap_ms ({}) must not be below ingest.backoff_base_ms ({})",
                config.ingest.backoff_cap_ms, config.ingest.backoff_base_ms
            ),
        });
    }

    if config.client.reconnect_max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "client.reconnect_max_attempts must be at least 1".to_string(),
        });
    }

    if config.client.pending_window_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "client.pending_window_secs must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = UniboxConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_is_rejected() {
        let mut config = UniboxConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("database_path")));
    }

    #[test]
    fn backoff_cap_below_base_is_rejected() {
        let mut config = UniboxConfig::default();
        config.ingest.backoff_base_ms = 10_000;
        config.ingest.backoff_cap_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("backoff_cap_ms"));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = UniboxConfig::default();
        config.hub.host = String::new();
        config.ingest.max_attempts = 0;
        config.client.pending_window_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
