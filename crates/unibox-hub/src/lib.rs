// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket hub serving the unified inbox.
//!
//! The hub exposes a REST surface for ingest, conversation history and
//! retry-queue operations, and a WebSocket endpoint that fans live events
//! out to every connected session of a user. The session registry is the
//! [`HubNotifier`](unibox_core::HubNotifier) the ingestion gateway writes
//! into, so a pushed payload surfaces on open sockets without polling.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod sessions;
pub mod ws;

pub use auth::{AuthConfig, AuthVerifier, StaticTokenVerifier};
pub use server::{build_router, start_server, HubState, ServerConfig};
pub use sessions::SessionRegistry;
