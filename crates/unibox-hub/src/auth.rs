// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the hub.
//!
//! REST routes use bearer-token middleware (`Authorization: Bearer <token>`).
//! When no token is configured, all API requests are rejected (fail-closed).
//! WebSocket sessions authenticate with per-user session tokens behind the
//! [`AuthVerifier`] trait; credential storage itself is an external
//! collaborator, so the built-in verifier is a static token map.

use std::collections::HashMap;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Bearer-token configuration for the REST surface.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects all API requests.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Middleware validating `Authorization: Bearer <token>` on API routes.
///
/// Rejects everything when no token is configured (fail-closed).
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref expected_token) = auth.bearer_token else {
        tracing::error!("hub has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected_token => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Verifies a WebSocket session credential, yielding the user it belongs to.
pub trait AuthVerifier: Send + Sync + 'static {
    /// Returns the user id for a valid token, `None` otherwise.
    fn verify(&self, token: &str) -> Option<String>;
}

/// Static token -> user map from `[hub] session_tokens` config.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl AuthVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_debug_redacts_token() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }

    #[test]
    fn static_verifier_maps_token_to_user() {
        let verifier = StaticTokenVerifier::new(HashMap::from([(
            "tok-1".to_string(),
            "user-1".to_string(),
        )]));
        assert_eq!(verifier.verify("tok-1").as_deref(), Some("user-1"));
        assert!(verifier.verify("tok-2").is_none());
        assert!(verifier.verify("").is_none());
    }
}
