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

use super::identity::{materialize_replica, parse_ordinal};
use crate::replicore::logger::log_warn;
use crate::replicore::model::replica::Replica;
use crate::replicore::model::set::OrderedSet;
use std::collections::BTreeSet;

const COMPONENT: &str = "orderedset-controller";

/// Replica counters derived from one observation of the set.
///
/// Terminating replicas count toward the total but are excluded from the
/// current and updated counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicaCounts {
    pub total: i32,
    pub ready: i32,
    pub current: i32,
    pub updated: i32,
}

/// Output of the classifier: the sorted positional view the driver walks,
/// the unhealthy subsequence it repairs, and the status counters.
#[derive(Debug, Clone)]
pub struct ClassifiedReplicas {
    /// Observed replicas sorted by (ordinal, creation time, name).
    /// Duplicate ordinals from stale caches are retained; they surface as
    /// surplus during scale-down.
    pub replicas: Vec<Replica>,
    /// First-per-ordinal replicas that are not healthy, plus a synthetic
    /// placeholder for every missing ordinal below the target count, in
    /// ordinal order.
    pub unhealthy: Vec<Replica>,
    pub counts: ReplicaCounts,
}

/// Classifies the observed replica list. Pure over its inputs aside from a
/// warn log for replicas whose ordinal does not parse; those are skipped for
/// the pass and repaired once their names are sane.
pub fn classify_replicas(
    set: &OrderedSet,
    current_set: &OrderedSet,
    update_set: &OrderedSet,
    current_revision: &str,
    update_revision: &str,
    observed: &[Replica],
) -> ClassifiedReplicas {
    let mut keyed: Vec<(u32, Replica)> = Vec::with_capacity(observed.len());
    for replica in observed {
        match parse_ordinal(set.name(), replica.name()) {
            Some(ordinal) => keyed.push((ordinal, replica.clone())),
            None => {
                log_warn(
                    COMPONENT,
                    "skipping replica with unparseable ordinal",
                    &[
                        ("namespace", set.namespace()),
                        ("set", set.name()),
                        ("replica", replica.name()),
                    ],
                );
            }
        }
    }

    keyed.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| {
                a.1.metadata
                    .creation_timestamp
                    .cmp(&b.1.metadata.creation_timestamp)
            })
            .then_with(|| a.1.metadata.name.cmp(&b.1.metadata.name))
    });

    let mut counts = ReplicaCounts::default();
    let mut seen: BTreeSet<u32> = BTreeSet::new();
    let mut unhealthy: Vec<(u32, Replica)> = Vec::new();

    for (ordinal, replica) in &keyed {
        counts.total += 1;
        if replica.is_running_and_ready() {
            counts.ready += 1;
        }
        if replica.is_created() && !replica.is_terminating() {
            if replica.revision_tag() == current_revision {
                counts.current += 1;
            }
            if replica.revision_tag() == update_revision {
                counts.updated += 1;
            }
        }

        // Only the first replica per ordinal drives repair decisions.
        if seen.insert(*ordinal) && !replica.is_healthy() {
            unhealthy.push((*ordinal, replica.clone()));
        }
    }

    for ordinal in 0..set.spec.target_replicas() as u32 {
        if !seen.contains(&ordinal) {
            unhealthy.push((
                ordinal,
                materialize_replica(
                    current_set,
                    update_set,
                    current_revision,
                    update_revision,
                    ordinal,
                ),
            ));
        }
    }

    unhealthy.sort_by_key(|(ordinal, _)| *ordinal);

    ClassifiedReplicas {
        replicas: keyed.into_iter().map(|(_, replica)| replica).collect(),
        unhealthy: unhealthy.into_iter().map(|(_, replica)| replica).collect(),
        counts,
    }
}
