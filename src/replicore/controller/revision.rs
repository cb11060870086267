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

//! Revision bookkeeping: sorting, structural equivalence, rollback
//! detection, and collision-avoiding persistence.

use super::context::ReconcileContext;
use super::ControlError;
use crate::replicore::model::replica::{ObjectMeta, LABEL_SET_NAME};
use crate::replicore::model::revision::{OwnerReference, RevisionRecord};
use crate::replicore::model::set::{LabelSelector, OrderedSet, ReplicaTemplateSpec};
use chrono::Utc;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::cmp::min;

const REVISION_HASH_LENGTH: usize = 10;

/// Capability that lists, adopts, persists, renumbers, and deletes immutable
/// revision records keyed by name.
pub trait RevisionStore: Send + Sync {
    /// Returns all revisions owned by or matching the set's selector.
    fn list_revisions(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        selector: &LabelSelector,
    ) -> Result<Vec<RevisionRecord>, ControlError>;

    /// Takes ownership of an unowned revision matching the selector.
    fn adopt_revision(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        revision: RevisionRecord,
    ) -> Result<RevisionRecord, ControlError>;

    /// Persists a new revision. Signals `ControlError::RevisionCollision`
    /// when a differently-shaped record already holds the derived name.
    fn create_revision(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        revision: RevisionRecord,
    ) -> Result<RevisionRecord, ControlError>;

    /// Bumps the revision integer on an existing record.
    fn update_revision(
        &self,
        ctx: &ReconcileContext,
        revision: &RevisionRecord,
        new_revision: i64,
    ) -> Result<RevisionRecord, ControlError>;

    fn delete_revision(
        &self,
        ctx: &ReconcileContext,
        revision: &RevisionRecord,
    ) -> Result<(), ControlError>;
}

/// Sorts revisions into the canonical ascending (revision, creation time,
/// name) order every other operation expects.
pub fn sort_revisions(revisions: &mut [RevisionRecord]) {
    revisions.sort_by(|a, b| {
        a.revision
            .cmp(&b.revision)
            .then_with(|| {
                a.metadata
                    .creation_timestamp
                    .cmp(&b.metadata.creation_timestamp)
            })
            .then_with(|| a.metadata.name.cmp(&b.metadata.name))
    });
}

/// Structural equivalence: equal templates, regardless of name or number.
pub fn revisions_equal(a: &RevisionRecord, b: &RevisionRecord) -> bool {
    a.data == b.data
}

/// Indices of revisions equivalent to `needle`, in list order. With a sorted
/// input the last index is the equivalent with the greatest revision number.
pub fn find_equal_revisions(revisions: &[RevisionRecord], needle: &RevisionRecord) -> Vec<usize> {
    revisions
        .iter()
        .enumerate()
        .filter(|(_, record)| revisions_equal(record, needle))
        .map(|(idx, _)| idx)
        .collect()
}

/// The revision number a freshly captured template receives.
pub fn next_revision(revisions: &[RevisionRecord]) -> i64 {
    revisions.iter().map(|r| r.revision).max().unwrap_or(0) + 1
}

/// Derives the content-addressed record name from the set name, the encoded
/// template, and the collision count.
pub fn revision_name(
    set: &OrderedSet,
    data: &Value,
    collision_count: i32,
) -> Result<String, ControlError> {
    let payload = serde_json::to_vec(data).map_err(ControlError::Serialization)?;
    let mut hasher = Sha1::new();
    hasher.update(&payload);
    hasher.update(collision_count.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let end = min(REVISION_HASH_LENGTH, digest.len());
    Ok(format!("{}-{}", set.name(), &digest[..end]))
}

/// Captures the set's current template as an unpersisted revision record.
pub fn new_revision(
    set: &OrderedSet,
    revision: i64,
    collision_count: i32,
) -> Result<RevisionRecord, ControlError> {
    let data = serde_json::to_value(&set.spec.template).map_err(ControlError::Serialization)?;
    let name = revision_name(set, &data, collision_count)?;

    let mut labels = set.spec.selector.match_labels.clone();
    labels.insert(LABEL_SET_NAME.to_string(), set.name().to_string());

    Ok(RevisionRecord {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(set.namespace().to_string()),
            labels,
            creation_timestamp: Some(Utc::now()),
            ..Default::default()
        },
        owner: Some(OwnerReference {
            kind: set.kind.clone(),
            name: set.name().to_string(),
            uid: set.metadata.uid.clone(),
        }),
        revision,
        data,
    })
}

/// Returns the set with the revision's template swapped in. The two concrete
/// shapes a new replica can be materialized from come out of this.
pub fn apply_revision(
    set: &OrderedSet,
    revision: &RevisionRecord,
) -> Result<OrderedSet, ControlError> {
    let template: ReplicaTemplateSpec =
        serde_json::from_value(revision.data.clone()).map_err(ControlError::Serialization)?;
    let mut applied = set.clone();
    applied.spec.template = template;
    Ok(applied)
}

/// Computes the current and update revisions for a pass.
///
/// The decision table for the update revision: reuse the last record when it
/// is already equivalent to the live template; roll back by renumbering the
/// newest equivalent record when an older one matches; otherwise persist the
/// fresh candidate, bumping the collision count and retrying once if its
/// derived name is taken by a different shape. Expects `revisions` sorted.
pub fn compute_revisions(
    ctx: &ReconcileContext,
    store: &dyn RevisionStore,
    set: &OrderedSet,
    revisions: &[RevisionRecord],
) -> Result<(RevisionRecord, RevisionRecord, i32), ControlError> {
    let mut collision_count = set
        .status
        .as_ref()
        .and_then(|status| status.collision_count)
        .unwrap_or(0);

    let candidate = new_revision(set, next_revision(revisions), collision_count)?;
    let equal = find_equal_revisions(revisions, &candidate);

    let update = match equal.last().copied() {
        Some(last_equal) if last_equal == revisions.len() - 1 => {
            // The live template is already the newest revision.
            revisions[last_equal].clone()
        }
        Some(last_equal) => {
            // Rollback: promote the equivalent record by renumbering it.
            store.update_revision(ctx, &revisions[last_equal], candidate.revision)?
        }
        None => persist_candidate(ctx, store, set, candidate, &mut collision_count)?,
    };

    let recorded_current = set
        .status
        .as_ref()
        .map(|status| status.current_revision.as_str())
        .unwrap_or("");
    let current = revisions
        .iter()
        .find(|record| record.name() == recorded_current && !recorded_current.is_empty())
        .cloned()
        .unwrap_or_else(|| update.clone());

    Ok((current, update, collision_count))
}

fn persist_candidate(
    ctx: &ReconcileContext,
    store: &dyn RevisionStore,
    set: &OrderedSet,
    candidate: RevisionRecord,
    collision_count: &mut i32,
) -> Result<RevisionRecord, ControlError> {
    match store.create_revision(ctx, set, candidate.clone()) {
        Ok(created) => Ok(created),
        Err(ControlError::RevisionCollision(_)) => {
            *collision_count += 1;
            let renamed = new_revision(set, candidate.revision, *collision_count)?;
            store.create_revision(ctx, set, renamed)
        }
        Err(err) => Err(err),
    }
}
