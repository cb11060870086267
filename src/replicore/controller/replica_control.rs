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

use super::context::ReconcileContext;
use super::ControlError;
use crate::replicore::model::replica::Replica;
use crate::replicore::model::set::OrderedSet;

/// Platform-side primitives for replicas and their storage claims.
///
/// Implementations own the actual apply/delete mechanics; the core only
/// decides which calls to issue and in what order. All calls must be
/// idempotent under retry and honor cancellation through the context.
pub trait ReplicaControl: Send + Sync {
    /// Materializes a new replica together with its storage-claim bindings.
    /// Fails when a replica with the same name already exists.
    fn create_replica(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        replica: &Replica,
    ) -> Result<(), ControlError>;

    /// Best-effort in-place repair of identity and storage so `replica`
    /// matches `update_set`. The replica is an owned copy; implementations
    /// may mutate it freely without touching any shared cache. Fails with
    /// `ControlError::Conflict` on an optimistic-concurrency conflict.
    fn update_replica(
        &self,
        ctx: &ReconcileContext,
        update_set: &OrderedSet,
        replica: Replica,
    ) -> Result<(), ControlError>;

    /// Requests termination. May return success while the replica is still
    /// draining in the terminating state.
    fn delete_replica(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        replica: &Replica,
    ) -> Result<(), ControlError>;
}
