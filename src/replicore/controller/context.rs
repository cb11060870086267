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

use super::ControlError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execution context threaded through a single reconcile pass.
///
/// Carries a cooperative cancellation flag. The driver checks it at phase
/// boundaries and before every platform mutation; collaborators receive the
/// context so long-running calls can bail out as well. Cancellation performs
/// no cleanup — the next pass repairs whatever was left half done.
#[derive(Clone, Default)]
pub struct ReconcileContext {
    cancelled: Arc<AtomicBool>,
}

impl ReconcileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the pass holding (a clone of) this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns `ControlError::Cancelled` once `cancel` has been called.
    pub fn ensure_active(&self) -> Result<(), ControlError> {
        if self.is_cancelled() {
            Err(ControlError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_contexts_are_active() {
        let ctx = ReconcileContext::new();
        assert!(!ctx.is_cancelled());
        assert!(ctx.ensure_active().is_ok());
    }

    #[test]
    fn cancellation_is_visible_through_clones() {
        let ctx = ReconcileContext::new();
        let shared = ctx.clone();
        shared.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(
            ctx.ensure_active(),
            Err(ControlError::Cancelled)
        ));
    }
}
