// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`HubNotifier`] that records every event for assertions.

use async_trait::async_trait;
use std::sync::Mutex;
use unibox_core::events::HubEvent;
use unibox_core::HubNotifier;

/// Captures `(user_id, event)` pairs in delivery order.
#[derive(Default)]
pub struct CaptureHub {
    events: Mutex<Vec<(String, HubEvent)>>,
}

impl CaptureHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events, in delivery order.
    pub fn events(&self) -> Vec<(String, HubEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Events delivered to a single user.
    pub fn events_for(&self, user_id: &str) -> Vec<HubEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// How many captured events carry the given wire name.
    pub fn count_of(&self, event_name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.name() == event_name)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl HubNotifier for CaptureHub {
    async fn notify(&self, user_id: &str, event: HubEvent) {
        self.events
            .lock()
            .unwrap()
            .push((user_id.to_string(), event));
    }
}
