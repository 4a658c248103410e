// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live WebSocket session registry and event fan-out.
//!
//! Sessions are ephemeral: created on connect, destroyed on disconnect,
//! never persisted. Fan-out is user-scoped and at-most-once per live
//! connection; sending to a session whose receiver is gone is a silent
//! no-op, and the stale entry is pruned on the next notify.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use unibox_core::events::HubEvent;
use unibox_core::HubNotifier;

/// One live, authenticated WebSocket connection.
struct Session {
    user_id: String,
    tx: mpsc::Sender<String>,
}

/// Registry of live sessions, keyed by connection id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection. Frames pushed to the returned
    /// channel's receiver side are written to the socket by the connection's
    /// write task.
    pub fn register(&self, conn_id: &str, user_id: &str, tx: mpsc::Sender<String>) {
        self.sessions.insert(
            conn_id.to_string(),
            Session {
                user_id: user_id.to_string(),
                tx,
            },
        );
        metrics::gauge!("unibox_hub_sessions").set(self.sessions.len() as f64);
        debug!(conn_id, user_id, "session registered");
    }

    /// Remove a connection. Removing an unknown id is a no-op.
    pub fn unregister(&self, conn_id: &str) {
        if self.sessions.remove(conn_id).is_some() {
            metrics::gauge!("unibox_hub_sessions").set(self.sessions.len() as f64);
            debug!(conn_id, "session unregistered");
        }
    }

    /// Number of live sessions for one user.
    pub fn session_count(&self, user_id: &str) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl HubNotifier for SessionRegistry {
    async fn notify(&self, user_id: &str, event: HubEvent) {
        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "dropping unserializable event");
                return;
            }
        };

        // Collect matching senders first; DashMap guards must not be held
        // across awaits.
        let targets: Vec<(String, mpsc::Sender<String>)> = self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| (entry.key().clone(), entry.tx.clone()))
            .collect();

        let mut delivered = 0usize;
        for (conn_id, tx) in targets {
            if tx.send(frame.clone()).await.is_err() {
                // Receiver gone: the connection died without unregistering.
                self.sessions.remove(&conn_id);
            } else {
                delivered += 1;
            }
        }
        trace!(user_id, event = event.name(), delivered, "event fanned out");
        metrics::counter!("unibox_hub_events_total", "event" => event.name()).increment(1);
    }
}
