// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket client with an explicit reconnect state machine.
//!
//! The connection lifecycle is a named state, never an implicit loop
//! counter: `Idle -> Connecting -> Connected -> Authenticated`, dropping to
//! `Reconnecting(attempt)` on failure. Backoff is exponential and capped;
//! after the attempt budget is exhausted the client parks in `Closed` and
//! stays there until the caller explicitly asks for a new run. Rejected
//! credentials also go straight to `Closed` since retrying them cannot
//! succeed.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unibox_core::events::HubEvent;
use unibox_core::UniboxError;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never started, or reset by the caller.
    Idle,
    /// Dialing the hub.
    Connecting,
    /// Socket open, authentication frame not yet accepted.
    Connected,
    /// Receiving the event stream.
    Authenticated,
    /// Waiting out the backoff before attempt `n`.
    Reconnecting(u32),
    /// Gave up. Requires an explicit new `run` call.
    Closed,
}

/// Backoff schedule for reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Build the policy from `[client]` configuration.
    pub fn from_config(config: &unibox_config::model::ClientConfig) -> Self {
        Self {
            base: Duration::from_millis(config.reconnect_base_ms),
            cap: Duration::from_millis(config.reconnect_cap_ms),
            max_attempts: config.reconnect_max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), or `None` when
    /// the budget is exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_attempts {
            return None;
        }
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self
            .base
            .checked_mul(1u32 << exp)
            .unwrap_or(self.cap);
        Some(delay.min(self.cap))
    }
}

/// Why a [`HubClient::run`] call ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Disconnect {
    /// The cancellation token fired.
    Cancelled,
    /// The hub rejected the credential.
    AuthRejected,
    /// Every reconnect attempt failed.
    Exhausted,
}

/// Hub event-stream client.
///
/// `run` owns the connection until it ends; events are forwarded on the
/// channel handed to it. After `run` returns the client is `Closed` and a
/// fresh `run` call is the explicit caller-triggered reconnect.
pub struct HubClient {
    url: String,
    token: String,
    policy: ReconnectPolicy,
    state: ConnectionState,
}

impl HubClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            policy: ReconnectPolicy::default(),
            state: ConnectionState::Idle,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connect and stream events into `event_tx` until cancelled, rejected,
    /// or out of reconnect attempts.
    pub async fn run(
        &mut self,
        event_tx: mpsc::UnboundedSender<HubEvent>,
        cancel: &CancellationToken,
    ) -> Disconnect {
        let mut attempt: u32 = 0;
        loop {
            self.state = ConnectionState::Connecting;
            match self.connect_once(&event_tx, cancel).await {
                Ok(SessionEnd::Cancelled) => {
                    self.state = ConnectionState::Closed;
                    return Disconnect::Cancelled;
                }
                Ok(SessionEnd::AuthRejected) => {
                    warn!("hub rejected credentials, not retrying");
                    self.state = ConnectionState::Closed;
                    return Disconnect::AuthRejected;
                }
                Ok(SessionEnd::StreamEnded) => {
                    debug!("event stream ended, reconnecting");
                }
                Err(e) => {
                    debug!(error = %e, "connection attempt failed");
                }
            }

            attempt += 1;
            let Some(delay) = self.policy.delay_for(attempt) else {
                warn!(
                    attempts = self.policy.max_attempts,
                    "reconnect budget exhausted, closing"
                );
                self.state = ConnectionState::Closed;
                return Disconnect::Exhausted;
            };
            self.state = ConnectionState::Reconnecting(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = ConnectionState::Closed;
                    return Disconnect::Cancelled;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One dial-authenticate-stream session.
    async fn connect_once(
        &mut self,
        event_tx: &mpsc::UnboundedSender<HubEvent>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, UniboxError> {
        let (ws_stream, _) = connect_async(&self.url).await.map_err(|e| {
            UniboxError::Hub {
                message: format!("connect to {} failed", self.url),
                source: Some(Box::new(e)),
            }
        })?;
        self.state = ConnectionState::Connected;
        let (mut sink, mut stream) = ws_stream.split();

        let auth = serde_json::json!({ "type": "authenticate", "token": self.token });
        sink.send(Message::Text(auth.to_string().into()))
            .await
            .map_err(|e| UniboxError::Hub {
                message: "authentication frame send failed".to_string(),
                source: Some(Box::new(e)),
            })?;
        // The hub answers a bad credential with an error event and a close;
        // a good one silently starts the stream. Successful delivery of the
        // auth frame moves us forward, a rejection arrives as the first
        // stream item below.
        self.state = ConnectionState::Authenticated;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Cancelled);
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<HubEvent>(&text) {
                                Ok(HubEvent::Error { code, message }) if code == "auth_failed" => {
                                    debug!(%message, "authentication rejected");
                                    return Ok(SessionEnd::AuthRejected);
                                }
                                Ok(event) => {
                                    if event_tx.send(event).is_err() {
                                        // Receiver dropped, nobody is listening.
                                        return Ok(SessionEnd::Cancelled);
                                    }
                                }
                                Err(e) => {
                                    debug!(error = %e, "ignoring malformed event frame");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            sink.send(Message::Pong(data)).await.map_err(|e| {
                                UniboxError::Hub {
                                    message: "pong send failed".to_string(),
                                    source: Some(Box::new(e)),
                                }
                            })?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(SessionEnd::StreamEnded);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(UniboxError::Hub {
                                message: "event stream read failed".to_string(),
                                source: Some(Box::new(e)),
                            });
                        }
                    }
                }
            }
        }
    }
}

/// How a single connected session ended.
enum SessionEnd {
    Cancelled,
    AuthRejected,
    StreamEnded,
}
