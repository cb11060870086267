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

//! Replica naming, identity, and storage bindings.
//!
//! Both identity and storage are pure functions of (set, ordinal): the name
//! carries the ordinal, the hostname and subdomain pin the network identity
//! to the governing service, and every claim template maps to exactly one
//! claim per ordinal.

use crate::replicore::model::replica::{
    Replica, StorageClaimSource, VolumeSpec, LABEL_REPLICA_NAME, LABEL_REVISION, LABEL_SET_NAME,
};
use crate::replicore::model::set::{OrderedSet, UpdateStrategy};

/// Renders the canonical replica name for an ordinal.
pub fn replica_name(set: &OrderedSet, ordinal: u32) -> String {
    format!("{}-{}", set.name(), ordinal)
}

/// Extracts the ordinal from a replica name of the form `{set}-{ordinal}`.
/// Returns `None` for names that do not belong to the set or carry a
/// non-numeric suffix.
pub fn parse_ordinal(set_name: &str, replica_name: &str) -> Option<u32> {
    let prefix = format!("{}-", set_name);
    replica_name.strip_prefix(&prefix)?.parse().ok()
}

/// Renders the storage claim name bound to `ordinal` for one claim template.
pub fn claim_name(set: &OrderedSet, template_name: &str, ordinal: u32) -> String {
    format!("{}-{}-{}", template_name, set.name(), ordinal)
}

/// Writes the revision tag. Only done when materializing a new descriptor.
pub fn set_revision_tag(replica: &mut Replica, tag: &str) {
    replica
        .metadata
        .labels
        .insert(LABEL_REVISION.to_string(), tag.to_string());
}

/// Stamps name, namespace, labels, and network identity for `ordinal` onto
/// the replica.
pub fn update_identity(set: &OrderedSet, ordinal: u32, replica: &mut Replica) {
    let name = replica_name(set, ordinal);
    replica.metadata.namespace = Some(set.namespace().to_string());
    replica
        .metadata
        .labels
        .insert(LABEL_SET_NAME.to_string(), set.name().to_string());
    replica
        .metadata
        .labels
        .insert(LABEL_REPLICA_NAME.to_string(), name.clone());
    replica.spec.hostname = Some(name.clone());
    replica.spec.subdomain = Some(set.spec.service_name.clone());
    replica.metadata.name = Some(name);
}

/// True when the replica carries the identity its ordinal demands.
pub fn identity_matches(set: &OrderedSet, replica: &Replica) -> bool {
    let Some(ordinal) = parse_ordinal(set.name(), replica.name()) else {
        return false;
    };
    let expected = replica_name(set, ordinal);

    replica.name() == expected
        && replica.metadata.namespace.as_deref() == Some(set.namespace())
        && replica.metadata.labels.get(LABEL_SET_NAME).map(String::as_str) == Some(set.name())
        && replica
            .metadata
            .labels
            .get(LABEL_REPLICA_NAME)
            .map(String::as_str)
            == Some(expected.as_str())
        && replica.spec.hostname.as_deref() == Some(expected.as_str())
        && replica.spec.subdomain.as_deref() == Some(set.spec.service_name.as_str())
}

/// Rebinds the replica's claim-backed volumes to the claims its ordinal
/// owns. Volumes without a claim template counterpart pass through.
pub fn update_storage(set: &OrderedSet, ordinal: u32, replica: &mut Replica) {
    let mut volumes: Vec<VolumeSpec> = Vec::with_capacity(set.spec.claim_templates.len());
    for template in &set.spec.claim_templates {
        volumes.push(VolumeSpec {
            name: template.name().to_string(),
            storage_claim: Some(StorageClaimSource {
                claim_name: claim_name(set, template.name(), ordinal),
            }),
        });
    }

    for volume in &replica.spec.volumes {
        let claimed = set
            .spec
            .claim_templates
            .iter()
            .any(|template| template.name() == volume.name);
        if !claimed {
            volumes.push(volume.clone());
        }
    }

    replica.spec.volumes = volumes;
}

/// True when every claim template is bound to the claim owned by the
/// replica's ordinal.
pub fn storage_matches(set: &OrderedSet, replica: &Replica) -> bool {
    let Some(ordinal) = parse_ordinal(set.name(), replica.name()) else {
        return false;
    };

    set.spec.claim_templates.iter().all(|template| {
        let expected = claim_name(set, template.name(), ordinal);
        replica.spec.volumes.iter().any(|volume| {
            volume.name == template.name()
                && volume
                    .storage_claim
                    .as_ref()
                    .map(|claim| claim.claim_name == expected)
                    .unwrap_or(false)
        })
    })
}

/// Builds an unpersisted replica descriptor for `ordinal` from the set's
/// template, with identity and storage bindings applied.
pub fn new_replica(set: &OrderedSet, ordinal: u32) -> Replica {
    let mut replica = Replica {
        metadata: set.spec.template.metadata.clone(),
        spec: set.spec.template.spec.clone(),
        status: Default::default(),
    };
    update_identity(set, ordinal, &mut replica);
    update_storage(set, ordinal, &mut replica);
    replica
}

/// Materializes the descriptor for `ordinal`, picking the template and
/// revision tag by the partition rule: ordinals below the partition stay on
/// the current revision, everything else lands on the update revision.
pub fn materialize_replica(
    current_set: &OrderedSet,
    update_set: &OrderedSet,
    current_revision: &str,
    update_revision: &str,
    ordinal: u32,
) -> Replica {
    let use_current = match current_set.spec.update_strategy {
        UpdateStrategy::RollingUpdate { partition } => ordinal < partition,
        UpdateStrategy::OnDelete => false,
    };

    let mut replica = if use_current {
        new_replica(current_set, ordinal)
    } else {
        new_replica(update_set, ordinal)
    };
    set_revision_tag(
        &mut replica,
        if use_current {
            current_revision
        } else {
            update_revision
        },
    );
    replica
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicore::model::replica::ObjectMeta;
    use crate::replicore::model::set::{
        LabelSelector, OrderedSetSpec, ReplicaTemplateSpec, StorageClaimSpec,
        StorageClaimTemplate,
    };

    fn sample_set(claims: &[&str], strategy: UpdateStrategy) -> OrderedSet {
        let claim_templates = claims
            .iter()
            .map(|name| StorageClaimTemplate {
                metadata: ObjectMeta {
                    name: Some((*name).to_string()),
                    ..Default::default()
                },
                spec: StorageClaimSpec::default(),
            })
            .collect();

        OrderedSet::new(
            ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            OrderedSetSpec {
                service_name: "web-svc".to_string(),
                replicas: 3,
                selector: LabelSelector::default(),
                template: ReplicaTemplateSpec::default(),
                update_strategy: strategy,
                revision_history_limit: None,
                claim_templates,
                burst: false,
            },
        )
    }

    #[test]
    fn ordinals_parse_only_for_well_formed_names() {
        assert_eq!(parse_ordinal("web", "web-0"), Some(0));
        assert_eq!(parse_ordinal("web", "web-12"), Some(12));
        assert_eq!(parse_ordinal("web", "web-"), None);
        assert_eq!(parse_ordinal("web", "web-two"), None);
        assert_eq!(parse_ordinal("web", "db-0"), None);
        assert_eq!(parse_ordinal("web", "web"), None);
    }

    #[test]
    fn new_replicas_carry_identity_and_storage() {
        let set = sample_set(&["data"], UpdateStrategy::default());
        let replica = new_replica(&set, 2);

        assert_eq!(replica.name(), "web-2");
        assert_eq!(replica.spec.hostname.as_deref(), Some("web-2"));
        assert_eq!(replica.spec.subdomain.as_deref(), Some("web-svc"));
        assert!(identity_matches(&set, &replica));
        assert!(storage_matches(&set, &replica));
        assert_eq!(
            replica.spec.volumes[0]
                .storage_claim
                .as_ref()
                .map(|c| c.claim_name.as_str()),
            Some("data-web-2")
        );
    }

    #[test]
    fn identity_mismatch_is_detected() {
        let set = sample_set(&[], UpdateStrategy::default());
        let mut replica = new_replica(&set, 0);
        assert!(identity_matches(&set, &replica));

        replica.spec.hostname = Some("stale".to_string());
        assert!(!identity_matches(&set, &replica));
    }

    #[test]
    fn storage_repair_rebinds_claims_and_keeps_foreign_volumes() {
        let set = sample_set(&["data"], UpdateStrategy::default());
        let mut replica = new_replica(&set, 1);
        replica.spec.volumes = vec![
            VolumeSpec {
                name: "data".to_string(),
                storage_claim: Some(StorageClaimSource {
                    claim_name: "data-web-0".to_string(),
                }),
            },
            VolumeSpec {
                name: "scratch".to_string(),
                storage_claim: None,
            },
        ];
        assert!(!storage_matches(&set, &replica));

        update_storage(&set, 1, &mut replica);
        assert!(storage_matches(&set, &replica));
        assert!(replica.spec.volumes.iter().any(|v| v.name == "scratch"));
    }

    #[test]
    fn materializer_honors_the_partition_floor() {
        let set = sample_set(&[], UpdateStrategy::RollingUpdate { partition: 2 });
        let below = materialize_replica(&set, &set, "rev-current", "rev-update", 1);
        assert_eq!(below.revision_tag(), "rev-current");

        let above = materialize_replica(&set, &set, "rev-current", "rev-update", 2);
        assert_eq!(above.revision_tag(), "rev-update");
    }

    #[test]
    fn materializer_defaults_to_the_update_revision() {
        let set = sample_set(&[], UpdateStrategy::default());
        let replica = materialize_replica(&set, &set, "rev-current", "rev-update", 0);
        assert_eq!(replica.revision_tag(), "rev-update");
        assert!(!replica.is_created());
    }
}
