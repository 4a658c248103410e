// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `unibox serve` command implementation.
//!
//! Wires the full pipeline: SQLite storage, the ingestion gateway with its
//! hub-notifying fan-out, the retry scheduler draining deferred payloads in
//! the background, and the axum hub serving REST and WebSocket clients.
//! Ctrl+C / SIGTERM cancels one shared token; the hub drains in-flight
//! requests, the scheduler stops between batches, and the database is
//! checkpointed on the way out.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use unibox_config::UniboxConfig;
use unibox_core::UniboxError;
use unibox_hub::{
    start_server, AuthConfig, HubState, ServerConfig, SessionRegistry, StaticTokenVerifier,
};
use unibox_ingest::{GatewayOptions, IngestGateway};
use unibox_retry::{BackoffPolicy, RetryScheduler, SchedulerOptions};
use unibox_storage::Database;

use crate::shutdown;

/// Runs the `unibox serve` command until a shutdown signal arrives.
pub async fn run_serve(config: UniboxConfig) -> Result<(), UniboxError> {
    init_tracing(&config.inbox.log_level);

    info!(name = %config.inbox.name, "starting unibox serve");

    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let registry = Arc::new(SessionRegistry::new());

    let policy = BackoffPolicy {
        base_ms: config.ingest.backoff_base_ms,
        cap_ms: config.ingest.backoff_cap_ms,
    };
    let gateway = Arc::new(IngestGateway::new(
        db.clone(),
        registry.clone(),
        GatewayOptions {
            max_attempts: config.ingest.max_attempts,
            policy: policy.clone(),
            account_owners: config.ingest.account_owners.clone(),
        },
    ));

    let scheduler = RetryScheduler::new(
        db.clone(),
        gateway.clone(),
        SchedulerOptions {
            policy,
            poll_interval: Duration::from_millis(config.ingest.poll_interval_ms),
            retention_hours: config.ingest.retention_hours as i64,
        },
    );

    let cancel = shutdown::install_signal_handler();

    let scheduler_cancel = cancel.clone();
    let scheduler_task = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_cancel).await {
            error!(error = %e, "retry scheduler exited with an error");
        }
    });

    if config.hub.bearer_token.is_none() {
        warn!("hub.bearer_token is not set, REST API refuses all requests");
    }

    let state = HubState {
        db: db.clone(),
        gateway,
        registry,
        verifier: Arc::new(StaticTokenVerifier::new(config.hub.session_tokens.clone())),
        auth: AuthConfig {
            bearer_token: config.hub.bearer_token.clone(),
        },
        handshake_timeout: Duration::from_millis(config.hub.handshake_timeout_ms),
        retention_hours: config.ingest.retention_hours as i64,
        start_time: std::time::Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.hub.host.clone(),
        port: config.hub.port,
    };

    let result = start_server(&server_config, state, cancel.clone()).await;

    // A server failure (bind error) must also stop the scheduler.
    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "retry scheduler task panicked");
    }

    db.close().await?;
    info!("unibox serve shutdown complete");
    result
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("unibox={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
