/*
 * Copyright (C) 2025 The Replicore Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use super::{EventRecorder, EventSeverity};
use crate::replicore::model::set::OrderedSet;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

const DEFAULT_EVENT_RETENTION: usize = 1024;
const WATCH_BUFFER_SIZE: usize = 64;

/// Event captured by the in-memory recorder.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub namespace: String,
    pub set_name: String,
    pub severity: EventSeverity,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded in-memory event recorder with a broadcast watch feed. Useful for
/// embedders without a platform event API and for scenario tests.
pub struct InMemoryEventRecorder {
    store: Mutex<VecDeque<RecordedEvent>>,
    capacity: usize,
    watch: broadcast::Sender<RecordedEvent>,
}

impl InMemoryEventRecorder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_RETENTION)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (watch, _) = broadcast::channel(WATCH_BUFFER_SIZE);
        Self {
            store: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            watch,
        }
    }

    /// Snapshot of the retained events, oldest first.
    pub fn events(&self) -> Vec<RecordedEvent> {
        let guard = self.store.lock().unwrap_or_else(|e| e.into_inner());
        guard.iter().cloned().collect()
    }

    /// Drains and returns the retained events.
    pub fn take(&self) -> Vec<RecordedEvent> {
        let mut guard = self.store.lock().unwrap_or_else(|e| e.into_inner());
        guard.drain(..).collect()
    }

    /// Subscribes to events recorded after this call.
    pub fn watch(&self) -> broadcast::Receiver<RecordedEvent> {
        self.watch.subscribe()
    }
}

impl Default for InMemoryEventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder for InMemoryEventRecorder {
    fn emit(&self, set: &OrderedSet, severity: EventSeverity, reason: &str, message: &str) {
        let event = RecordedEvent {
            namespace: set.namespace().to_string(),
            set_name: set.name().to_string(),
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        {
            let mut guard = self.store.lock().unwrap_or_else(|e| e.into_inner());
            if guard.len() == self.capacity {
                guard.pop_front();
            }
            guard.push_back(event.clone());
        }

        // Nobody listening is fine.
        let _ = self.watch.send(event);
    }
}
