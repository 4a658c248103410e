// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed async locks serializing syncs per (platform, account).
//!
//! Concurrent syncs for the same account would interleave their upserts and
//! unread-count bumps; a per-key mutex serializes them while leaving
//! unrelated accounts fully concurrent.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use unibox_core::Platform;

#[derive(Default)]
pub struct SyncLocks {
    inner: DashMap<(Platform, String), Arc<Mutex<()>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one (platform, account) pair, waiting if a sync
    /// for that pair is already in flight.
    pub async fn acquire(&self, platform: Platform, account_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry((platform, account_id.to_string()))
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}
