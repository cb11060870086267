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

use crate::replicore::model::set::OrderedSet;

pub mod in_memory;

/// Severity attached to recorded events.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl EventSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            EventSeverity::Normal => "Normal",
            EventSeverity::Warning => "Warning",
        }
    }
}

/// Sink for human-visible events emitted during reconciliation, notably when
/// a failed replica is recreated. Emission is fire-and-forget; recorders must
/// never fail the reconcile.
pub trait EventRecorder: Send + Sync {
    fn emit(&self, set: &OrderedSet, severity: EventSeverity, reason: &str, message: &str);
}
