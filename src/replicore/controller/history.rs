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
use super::revision::RevisionStore;
use super::ControlError;
use crate::replicore::model::replica::Replica;
use crate::replicore::model::revision::RevisionRecord;
use crate::replicore::model::set::OrderedSet;
use std::collections::HashSet;

/// Garbage-collects revisions that are neither referenced by a live replica
/// nor by the current or update markers, keeping at most the set's history
/// limit of non-live records. The lowest revision numbers go first. Expects
/// `revisions` sorted; a deletion error aborts and the next pass retries.
pub fn truncate_history(
    ctx: &ReconcileContext,
    store: &dyn RevisionStore,
    set: &OrderedSet,
    replicas: &[Replica],
    revisions: &[RevisionRecord],
    current: &RevisionRecord,
    update: &RevisionRecord,
) -> Result<(), ControlError> {
    let mut live: HashSet<&str> = HashSet::with_capacity(replicas.len() + 2);
    live.insert(current.name());
    live.insert(update.name());
    for replica in replicas {
        live.insert(replica.revision_tag());
    }

    let non_live: Vec<&RevisionRecord> = revisions
        .iter()
        .filter(|record| !live.contains(record.name()))
        .collect();
    let limit = set.spec.history_limit();
    if non_live.len() <= limit {
        return Ok(());
    }

    for record in &non_live[..non_live.len() - limit] {
        ctx.ensure_active()?;
        store.delete_revision(ctx, record)?;
    }
    Ok(())
}
