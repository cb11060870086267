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

use crate::replicore::util::BoxedError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod classify;
pub mod context;
pub mod control;
pub mod history;
pub mod identity;
pub mod replica_control;
pub mod revision;
pub mod status;

/// Errors raised while reconciling an ordered set.
///
/// Every variant aborts the current pass; the outer loop re-enqueues the set
/// with backoff. `RevisionCollision` is additionally recovered in place by
/// the revision manager before it would propagate.
#[derive(Debug)]
pub enum ControlError {
    /// Transient platform failure (create, delete, list, status write).
    Platform(BoxedError),
    /// Optimistic-concurrency conflict on an in-place replica update; the
    /// next pass re-reads and retries.
    Conflict(String),
    /// A differently-shaped revision already holds the derived name.
    RevisionCollision(String),
    /// Template encode or decode failure.
    Serialization(serde_json::Error),
    /// The reconcile context was cancelled mid-pass.
    Cancelled,
}

impl Display for ControlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::Platform(err) => write!(f, "platform error: {}", err),
            ControlError::Conflict(message) => write!(f, "update conflict: {}", message),
            ControlError::RevisionCollision(name) => {
                write!(f, "revision name collision: {}", name)
            }
            ControlError::Serialization(err) => write!(f, "serialization error: {}", err),
            ControlError::Cancelled => write!(f, "reconcile cancelled"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ControlError::Platform(err) => Some(err.as_ref()),
            ControlError::Serialization(err) => Some(err),
            ControlError::Conflict(_)
            | ControlError::RevisionCollision(_)
            | ControlError::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicore::util::new_error;

    #[test]
    fn platform_errors_preserve_their_source() {
        let err = ControlError::Platform(new_error("connection reset"));
        assert_eq!(err.to_string(), "platform error: connection reset");
        assert!(err.source().is_some());
    }

    #[test]
    fn collision_errors_name_the_colliding_revision() {
        let err = ControlError::RevisionCollision("web-6b54f".to_string());
        assert_eq!(err.to_string(), "revision name collision: web-6b54f");
        assert!(err.source().is_none());
    }
}
