// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side reconciliation for the unified inbox.
//!
//! Three pieces cooperate on top of the hub's pull + stream APIs: the
//! [`Timeline`](timeline::Timeline) merges history pages, optimistic sends
//! and streamed events into one display order; the
//! [`PendingResolver`](pending::PendingResolver) polls send status for
//! optimistic entries within a bounded window; and the
//! [`HubClient`](reconnect::HubClient) keeps the event stream alive through
//! an explicit reconnect state machine.

pub mod pending;
pub mod reconnect;
pub mod timeline;

pub use pending::PendingResolver;
pub use reconnect::{ConnectionState, Disconnect, HubClient, ReconnectPolicy};
pub use timeline::{PendingMessage, Timeline, TimelineEntry};
