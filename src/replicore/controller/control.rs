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

//! The reconciliation driver for ordered sets.
//!
//! One call to [`SetControl::reconcile`] runs a single serial pass: revisions
//! are listed and resolved, the phase machine repairs and converges the
//! replica group, the resulting status is published, and surplus history is
//! garbage-collected. Scale-up proceeds in ordinal order and no new replica
//! is created while a predecessor is unhealthy; termination walks descending
//! ordinals; a rolling update retires one non-updated replica per pass. The
//! burst flag relaxes the creation gating only. Every decision is safe under
//! retry: an aborted pass publishes the progress it made and the next pass
//! picks up from whatever state the platform reports.

use super::classify::classify_replicas;
use super::context::ReconcileContext;
use super::history::truncate_history;
use super::identity::{identity_matches, parse_ordinal, storage_matches};
use super::replica_control::ReplicaControl;
use super::revision::{self, RevisionStore};
use super::status::{complete_rolling_update, inconsistent_status, StatusWriter};
use super::ControlError;
use crate::replicore::events::{EventRecorder, EventSeverity};
use crate::replicore::logger::{log_debug, log_info, log_warn};
use crate::replicore::model::replica::Replica;
use crate::replicore::model::revision::RevisionRecord;
use crate::replicore::model::set::{OrderedSet, OrderedSetStatus};
use std::collections::BTreeSet;
use std::sync::Arc;

const COMPONENT: &str = "orderedset-controller";

/// Drives an ordered set toward its declared specification through the
/// platform collaborators it is constructed with. The control itself holds
/// no state; per-set serialization is the outer loop's responsibility.
pub struct SetControl {
    replica_control: Arc<dyn ReplicaControl>,
    revision_store: Arc<dyn RevisionStore>,
    status_writer: Arc<dyn StatusWriter>,
    recorder: Arc<dyn EventRecorder>,
}

impl SetControl {
    pub fn new(
        replica_control: Arc<dyn ReplicaControl>,
        revision_store: Arc<dyn RevisionStore>,
        status_writer: Arc<dyn StatusWriter>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            replica_control,
            revision_store,
            status_writer,
            recorder,
        }
    }

    /// Executes one reconcile pass for `set` against the observed `replicas`.
    ///
    /// A non-nil error means the pass aborted and should be retried with
    /// backoff; status progress made before the abort has already been
    /// published best-effort.
    pub fn reconcile(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        replicas: &[Replica],
    ) -> Result<(), ControlError> {
        ctx.ensure_active()?;

        let mut revisions = self.list_revisions(ctx, set)?;
        revision::sort_revisions(&mut revisions);

        let (current, update, collision_count) =
            revision::compute_revisions(ctx, self.revision_store.as_ref(), set, &revisions)?;

        let mut status = OrderedSetStatus {
            observed_generation: set.metadata.generation,
            current_revision: current.name().to_string(),
            update_revision: update.name().to_string(),
            collision_count: Some(collision_count),
            ..Default::default()
        };

        let outcome = self.run_phases(ctx, set, &current, &update, replicas, &mut status);
        if let Err(err) = outcome {
            // Publish whatever progress the pass made before it aborted.
            if let Err(publish_err) = self.publish_status(ctx, set, status) {
                let error_text = publish_err.to_string();
                log_warn(
                    COMPONENT,
                    "failed to publish status for aborted pass",
                    &[
                        ("namespace", set.namespace()),
                        ("set", set.name()),
                        ("error", error_text.as_str()),
                    ],
                );
            }
            return Err(err);
        }

        self.publish_status(ctx, set, status.clone())?;
        self.log_pass_summary(set, &status);

        truncate_history(
            ctx,
            self.revision_store.as_ref(),
            set,
            replicas,
            &revisions,
            &current,
            &update,
        )
    }

    /// Returns all revisions matching the set's selector.
    pub fn list_revisions(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
    ) -> Result<Vec<RevisionRecord>, ControlError> {
        self.revision_store
            .list_revisions(ctx, set, &set.spec.selector)
    }

    /// Adopts any orphaned revisions that match the set's selector.
    pub fn adopt_orphan_revisions(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        revisions: Vec<RevisionRecord>,
    ) -> Result<Vec<RevisionRecord>, ControlError> {
        let mut adopted = Vec::with_capacity(revisions.len());
        for record in revisions {
            ctx.ensure_active()?;
            adopted.push(self.revision_store.adopt_revision(ctx, set, record)?);
        }
        Ok(adopted)
    }

    fn run_phases(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        current: &RevisionRecord,
        update: &RevisionRecord,
        replicas: &[Replica],
        status: &mut OrderedSetStatus,
    ) -> Result<(), ControlError> {
        let current_set = revision::apply_revision(set, current)?;
        let update_set = revision::apply_revision(set, update)?;

        // Phase 0: classify and seed the counters.
        let classified = classify_replicas(
            set,
            &current_set,
            &update_set,
            current.name(),
            update.name(),
            replicas,
        );
        status.replicas = classified.counts.total;
        status.ready_replicas = classified.counts.ready;
        status.current_replicas = classified.counts.current;
        status.updated_replicas = classified.counts.updated;

        if !classified.unhealthy.is_empty() {
            let unhealthy_count = classified.unhealthy.len().to_string();
            log_debug(
                COMPONENT,
                "set has replicas pending repair",
                &[
                    ("namespace", set.namespace()),
                    ("set", set.name()),
                    ("unhealthy", unhealthy_count.as_str()),
                    ("first", classified.unhealthy[0].name()),
                ],
            );
        }

        // Phase 1: a deleted set only gets its status refreshed.
        if set.metadata.deletion_timestamp.is_some() {
            return Ok(());
        }

        // Phase 2: repair unhealthy replicas in ordinal order. `blocked`
        // tracks whether a lower ordinal is still unready, which gates
        // ordered creation. `retired` records the ordinals whose delete was
        // issued here: the local view still shows them as non-terminating,
        // and the scale-down and update walks must not delete them again.
        let mut blocked = false;
        let mut retired: BTreeSet<u32> = BTreeSet::new();
        for entry in &classified.unhealthy {
            ctx.ensure_active()?;

            if entry.is_failed() {
                let message = format!(
                    "OrderedSet {}/{} is recreating failed replica {}",
                    set.namespace(),
                    set.name(),
                    entry.name()
                );
                self.recorder
                    .emit(set, EventSeverity::Warning, "RecreatingFailedPod", &message);
                self.replica_control.delete_replica(ctx, set, entry)?;
                if entry.revision_tag() == current.name() {
                    status.current_replicas -= 1;
                }
                if entry.revision_tag() == update.name() {
                    status.updated_replicas -= 1;
                }
                status.replicas -= 1;
                if let Some(ordinal) = parse_ordinal(set.name(), entry.name()) {
                    retired.insert(ordinal);
                }
                // The delete was this ordinal's one action; the classifier
                // materializes the replacement on the next pass.
                blocked = true;
                continue;
            }

            if !entry.is_created() {
                if !set.spec.burst && blocked {
                    log_debug(
                        COMPONENT,
                        "waiting for predecessors before creating replica",
                        &[
                            ("namespace", set.namespace()),
                            ("set", set.name()),
                            ("replica", entry.name()),
                        ],
                    );
                    continue;
                }
                self.replica_control.create_replica(ctx, set, entry)?;
                status.replicas += 1;
                if entry.revision_tag() == current.name() {
                    status.current_replicas += 1;
                }
                if entry.revision_tag() == update.name() {
                    status.updated_replicas += 1;
                }
                if !set.spec.burst {
                    // Ordered creation: one new replica per pass.
                    return Ok(());
                }
                continue;
            }

            blocked = true;
            if identity_matches(set, entry) && storage_matches(set, entry) {
                continue;
            }
            // The collaborator gets its own copy; the observed list stays
            // untouched.
            self.replica_control
                .update_replica(ctx, &update_set, entry.clone())?;
        }

        // Phase 3: scale down, highest ordinal first. Replicas already
        // terminating consume surplus without a new action.
        let target = set.spec.target_replicas();
        let mut surplus = classified.replicas.len() as i32 - target;
        for entry in classified.replicas.iter().rev() {
            if surplus <= 0 {
                break;
            }
            ctx.ensure_active()?;
            surplus -= 1;
            let deletion_pending = entry.is_terminating()
                || parse_ordinal(set.name(), entry.name())
                    .map(|ordinal| retired.contains(&ordinal))
                    .unwrap_or(false);
            if deletion_pending {
                log_debug(
                    COMPONENT,
                    "waiting for replica to terminate before scale down",
                    &[
                        ("namespace", set.namespace()),
                        ("set", set.name()),
                        ("replica", entry.name()),
                    ],
                );
                continue;
            }
            log_info(
                COMPONENT,
                "terminating replica for scale down",
                &[
                    ("namespace", set.namespace()),
                    ("set", set.name()),
                    ("replica", entry.name()),
                ],
            );
            self.replica_control.delete_replica(ctx, set, entry)?;
            if entry.revision_tag() == current.name() {
                status.current_replicas -= 1;
            }
            if entry.revision_tag() == update.name() {
                status.updated_replicas -= 1;
            }
            if entry.is_running_and_ready() {
                status.ready_replicas -= 1;
            }
            status.replicas -= 1;
        }

        // Phase 4: OnDelete leaves re-templating to the operator.
        if set.spec.update_strategy.is_on_delete() {
            return Ok(());
        }

        // Phase 5: advance the rolling update by retiring the highest
        // non-updated replica above the partition, one per pass. Ordinals
        // claimed by scale-down or already deleted during repair are not
        // update candidates.
        let update_min = set.spec.update_strategy.partition();
        for entry in classified.replicas.iter().rev() {
            let Some(ordinal) = parse_ordinal(set.name(), entry.name()) else {
                continue;
            };
            if ordinal >= target as u32 {
                continue;
            }
            if ordinal < update_min {
                break;
            }

            if entry.revision_tag() != update.name()
                && !entry.is_terminating()
                && !retired.contains(&ordinal)
            {
                ctx.ensure_active()?;
                log_info(
                    COMPONENT,
                    "terminating replica for update",
                    &[
                        ("namespace", set.namespace()),
                        ("set", set.name()),
                        ("replica", entry.name()),
                        ("update_revision", update.name()),
                    ],
                );
                status.current_replicas -= 1;
                self.replica_control.delete_replica(ctx, set, entry)?;
                return Ok(());
            }
            if !entry.is_healthy() {
                log_debug(
                    COMPONENT,
                    "waiting for replica to become healthy before continuing update",
                    &[
                        ("namespace", set.namespace()),
                        ("set", set.name()),
                        ("replica", entry.name()),
                    ],
                );
                return Ok(());
            }
        }

        Ok(())
    }

    fn publish_status(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        mut status: OrderedSetStatus,
    ) -> Result<(), ControlError> {
        complete_rolling_update(set, &mut status);
        if !inconsistent_status(set, &status) {
            return Ok(());
        }
        self.status_writer.update_status(ctx, set, &status)
    }

    fn log_pass_summary(&self, set: &OrderedSet, status: &OrderedSetStatus) {
        let replicas = status.replicas.to_string();
        let ready = status.ready_replicas.to_string();
        let current = status.current_replicas.to_string();
        let updated = status.updated_replicas.to_string();
        log_info(
            COMPONENT,
            "reconciled ordered set",
            &[
                ("namespace", set.namespace()),
                ("set", set.name()),
                ("replicas", replicas.as_str()),
                ("ready", ready.as_str()),
                ("current", current.as_str()),
                ("updated", updated.as_str()),
                ("current_revision", status.current_revision.as_str()),
                ("update_revision", status.update_revision.as_str()),
            ],
        );
    }
}
