// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the real-time event stream.
//!
//! Per-connection state machine: `connected (unauthenticated) ->
//! authenticated -> disconnected`. A connection authenticates either with a
//! `token` query parameter at upgrade time, or by sending
//! `{"type": "authenticate", "token": "..."}` as its first message within
//! the handshake timeout. An invalid credential or an expired handshake gets
//! an `error` event and the socket is closed.
//!
//! Server -> client frames are `{"event": ..., "data": ...}` envelopes
//! (see [`unibox_core::events::HubEvent`]).

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use unibox_core::events::HubEvent;

use crate::server::HubState;

/// Outbound frame buffer per connection. A client that cannot drain this
/// many events falls behind and starts losing deliveries (at-most-once).
const SESSION_BUFFER: usize = 64;

/// Query parameters accepted at upgrade time.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
}

/// First client message on connections that did not pass a query token.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsIncoming {
    Authenticate { token: String },
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<HubState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

/// Drive one connection from handshake to disconnect.
async fn handle_socket(socket: WebSocket, state: HubState, query_token: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();

    // Handshake: resolve a user id or close.
    let token = match query_token {
        Some(token) => Some(token),
        None => wait_for_auth_frame(&mut ws_receiver, &state).await,
    };
    let user_id = token.as_deref().and_then(|t| state.verifier.verify(t));

    let Some(user_id) = user_id else {
        let event = HubEvent::Error {
            code: "auth_failed".to_string(),
            message: "invalid or missing credential".to_string(),
        };
        if let Ok(frame) = serde_json::to_string(&event) {
            let _ = ws_sender.send(Message::Text(frame.into())).await;
        }
        let _ = ws_sender.send(Message::Close(None)).await;
        warn!(conn_id, "websocket handshake failed");
        return;
    };

    // Authenticated: register and start the write task.
    let (tx, mut rx) = mpsc::channel::<String>(SESSION_BUFFER);
    state.registry.register(&conn_id, &user_id, tx);

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // The stream is server -> client; inbound frames are only drained so
    // pings and closes are observed.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Close(_) => break,
            Message::Text(text) => {
                debug!(conn_id, len = text.len(), "ignoring client frame");
            }
            _ => {}
        }
    }

    state.registry.unregister(&conn_id);
    sender_task.abort();
}

/// Wait for the first `authenticate` frame, bounded by the handshake timeout.
async fn wait_for_auth_frame(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &HubState,
) -> Option<String> {
    let frame = tokio::time::timeout(state.handshake_timeout, receiver.next())
        .await
        .ok()??;
    let text = match frame {
        Ok(Message::Text(text)) => text,
        _ => return None,
    };
    match serde_json::from_str::<WsIncoming>(&text) {
        Ok(WsIncoming::Authenticate { token }) => Some(token),
        Err(e) => {
            debug!(error = %e, "first frame was not an authenticate message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_frame_deserializes() {
        let json = r#"{"type": "authenticate", "token": "tok-1"}"#;
        let WsIncoming::Authenticate { token } = serde_json::from_str(json).unwrap();
        assert_eq!(token, "tok-1");
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let json = r#"{"type": "subscribe", "channel": "x"}"#;
        assert!(serde_json::from_str::<WsIncoming>(json).is_err());
    }

    #[test]
    fn query_token_is_optional() {
        let query: WsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.token.is_none());
    }
}
