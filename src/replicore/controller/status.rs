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
use crate::replicore::model::set::{OrderedSet, OrderedSetStatus, UpdateStrategy};

/// Writeback primitive for publishing a set's reconciled status. The writer
/// receives shared references; it cannot mutate the cached set.
pub trait StatusWriter: Send + Sync {
    fn update_status(
        &self,
        ctx: &ReconcileContext,
        set: &OrderedSet,
        status: &OrderedSetStatus,
    ) -> Result<(), ControlError>;
}

/// Declares an in-progress rolling update complete once every replica is
/// ready at the update revision: the current marker advances to the update
/// marker. Partitioned rollouts never complete this way.
pub fn complete_rolling_update(set: &OrderedSet, status: &mut OrderedSetStatus) {
    let unpartitioned_rolling = matches!(
        set.spec.update_strategy,
        UpdateStrategy::RollingUpdate { partition: 0 }
    );
    let target = set.spec.target_replicas();

    if unpartitioned_rolling
        && status.replicas == target
        && status.updated_replicas == target
        && status.ready_replicas == target
        && status.current_revision != status.update_revision
    {
        status.current_replicas = status.updated_replicas;
        status.current_revision = status.update_revision.clone();
    }
}

/// Field-wise drift check against the last published status. Equivalent
/// statuses skip the write.
pub fn inconsistent_status(set: &OrderedSet, status: &OrderedSetStatus) -> bool {
    match set.status.as_ref() {
        Some(published) => published != status,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicore::model::replica::ObjectMeta;
    use crate::replicore::model::set::{
        LabelSelector, OrderedSetSpec, ReplicaTemplateSpec,
    };

    fn sample_set(replicas: i32, strategy: UpdateStrategy) -> OrderedSet {
        OrderedSet::new(
            ObjectMeta {
                name: Some("web".to_string()),
                ..Default::default()
            },
            OrderedSetSpec {
                service_name: "web".to_string(),
                replicas,
                selector: LabelSelector::default(),
                template: ReplicaTemplateSpec::default(),
                update_strategy: strategy,
                revision_history_limit: None,
                claim_templates: Vec::new(),
                burst: false,
            },
        )
    }

    fn rolled_out(replicas: i32) -> OrderedSetStatus {
        OrderedSetStatus {
            replicas,
            ready_replicas: replicas,
            current_replicas: 0,
            updated_replicas: replicas,
            current_revision: "web-old".to_string(),
            update_revision: "web-new".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn completed_rollouts_advance_the_current_marker() {
        let set = sample_set(3, UpdateStrategy::default());
        let mut status = rolled_out(3);
        complete_rolling_update(&set, &mut status);
        assert_eq!(status.current_revision, "web-new");
        assert_eq!(status.current_replicas, 3);
    }

    #[test]
    fn incomplete_rollouts_are_left_alone() {
        let set = sample_set(3, UpdateStrategy::default());
        let mut status = rolled_out(3);
        status.ready_replicas = 2;
        complete_rolling_update(&set, &mut status);
        assert_eq!(status.current_revision, "web-old");
    }

    #[test]
    fn partitioned_rollouts_never_complete() {
        let set = sample_set(3, UpdateStrategy::RollingUpdate { partition: 1 });
        let mut status = rolled_out(3);
        complete_rolling_update(&set, &mut status);
        assert_eq!(status.current_revision, "web-old");
    }

    #[test]
    fn on_delete_rollouts_never_complete() {
        let set = sample_set(3, UpdateStrategy::OnDelete);
        let mut status = rolled_out(3);
        complete_rolling_update(&set, &mut status);
        assert_eq!(status.current_revision, "web-old");
    }

    #[test]
    fn drift_detection_compares_field_wise() {
        let mut set = sample_set(1, UpdateStrategy::default());
        let status = OrderedSetStatus {
            replicas: 1,
            ready_replicas: 1,
            ..Default::default()
        };
        assert!(inconsistent_status(&set, &status), "no published status yet");

        set.status = Some(status.clone());
        assert!(!inconsistent_status(&set, &status), "identical status");

        let mut drifted = status;
        drifted.ready_replicas = 0;
        assert!(inconsistent_status(&set, &drifted));
    }
}
