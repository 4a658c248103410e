// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hub HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. Route map:
//! - `GET /health` (public)
//! - `POST /v1/ingest`, conversation and retry-queue routes (bearer auth)
//! - `GET /ws` (auth during the WebSocket handshake, not via middleware)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use unibox_core::UniboxError;
use unibox_ingest::IngestGateway;
use unibox_storage::Database;

use crate::auth::{auth_middleware, AuthConfig, AuthVerifier};
use crate::handlers;
use crate::sessions::SessionRegistry;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct HubState {
    pub db: Database,
    pub gateway: Arc<IngestGateway>,
    pub registry: Arc<SessionRegistry>,
    /// WebSocket session-token verifier.
    pub verifier: Arc<dyn AuthVerifier>,
    /// REST bearer-token configuration.
    pub auth: AuthConfig,
    /// Maximum time a connection may stay unauthenticated.
    pub handshake_timeout: Duration,
    /// Retention window applied by `POST /v1/retry/clean` when the request
    /// does not specify one.
    pub retention_hours: i64,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Hub server bind configuration (mirrors `HubConfig` from unibox-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the hub router. Factored out of [`start_server`] so tests can drive
/// it without binding a socket.
pub fn build_router(state: HubState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/ingest", post(handlers::post_ingest))
        .route("/v1/conversations", get(handlers::get_conversations))
        .route(
            "/v1/conversations/{id}/messages",
            get(handlers::get_conversation_messages),
        )
        .route(
            "/v1/conversations/{id}/read",
            post(handlers::post_conversation_read),
        )
        .route("/v1/retry/counts", get(handlers::get_retry_counts))
        .route("/v1/retry/failed", get(handlers::get_retry_failed))
        .route("/v1/retry/stats", get(handlers::get_retry_stats))
        .route("/v1/retry/{id}/retry", post(handlers::post_retry_job))
        .route("/v1/retry/clean", post(handlers::post_retry_clean))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Start the hub server and run it until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: HubState,
    cancel: CancellationToken,
) -> Result<(), UniboxError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| UniboxError::Hub {
            message: format!("failed to bind hub to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("hub listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| UniboxError::Hub {
            message: format!("hub server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
