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

use super::replica::{ObjectMeta, ReplicaSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Revisions kept beyond the live set when the spec leaves the limit unset.
pub const DEFAULT_REVISION_HISTORY_LIMIT: i32 = 10;

/// Minimal label selector supporting exact-match labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelSelector {
    #[serde(
        rename = "matchLabels",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub match_labels: HashMap<String, String>,
}

impl LabelSelector {
    /// True when every selector label is present with the expected value.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Template describing one replica of the set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReplicaTemplateSpec {
    pub metadata: ObjectMeta,
    pub spec: ReplicaSpec,
}

/// Requested shape of a per-ordinal storage claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageClaimSpec {
    #[serde(rename = "accessModes", default, skip_serializing_if = "Vec::is_empty")]
    pub access_modes: Vec<String>,
    #[serde(rename = "storageClassName", skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub requests: HashMap<String, String>,
}

/// Storage claim template embedded within an ordered set. Each ordinal gets
/// its own claim derived from the template name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageClaimTemplate {
    pub metadata: ObjectMeta,
    pub spec: StorageClaimSpec,
}

impl StorageClaimTemplate {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }
}

/// Update behaviour for an ordered set. A tagged variant, branched on by the
/// driver rather than dispatched through trait objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum UpdateStrategy {
    /// Monotonic rolling update; ordinals below `partition` stay frozen at
    /// the current revision.
    RollingUpdate {
        #[serde(default)]
        partition: u32,
    },
    /// Replicas are only re-templated when an operator deletes them.
    OnDelete,
}

impl Default for UpdateStrategy {
    fn default() -> Self {
        Self::RollingUpdate { partition: 0 }
    }
}

impl UpdateStrategy {
    pub fn is_on_delete(&self) -> bool {
        matches!(self, UpdateStrategy::OnDelete)
    }

    pub fn partition(&self) -> u32 {
        match self {
            UpdateStrategy::RollingUpdate { partition } => *partition,
            UpdateStrategy::OnDelete => 0,
        }
    }
}

/// Declared target state for an ordered replica group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderedSetSpec {
    /// Governing service granting replicas their stable network identity.
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub replicas: i32,
    pub selector: LabelSelector,
    pub template: ReplicaTemplateSpec,
    #[serde(rename = "updateStrategy", default)]
    pub update_strategy: UpdateStrategy,
    #[serde(
        rename = "revisionHistoryLimit",
        skip_serializing_if = "Option::is_none"
    )]
    pub revision_history_limit: Option<i32>,
    #[serde(
        rename = "claimTemplates",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub claim_templates: Vec<StorageClaimTemplate>,
    /// Relaxes ordinal gating: creations may proceed in parallel within a
    /// single pass.
    #[serde(default)]
    pub burst: bool,
}

impl OrderedSetSpec {
    /// Declared replica count clamped to zero.
    pub fn target_replicas(&self) -> i32 {
        self.replicas.max(0)
    }

    pub fn history_limit(&self) -> usize {
        self.revision_history_limit
            .unwrap_or(DEFAULT_REVISION_HISTORY_LIMIT)
            .max(0) as usize
    }
}

/// Published observation of a set after a reconcile pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderedSetStatus {
    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(rename = "readyReplicas", default)]
    pub ready_replicas: i32,
    #[serde(rename = "currentReplicas", default)]
    pub current_replicas: i32,
    #[serde(rename = "updatedReplicas", default)]
    pub updated_replicas: i32,
    #[serde(rename = "currentRevision", default)]
    pub current_revision: String,
    #[serde(rename = "updateRevision", default)]
    pub update_revision: String,
    #[serde(rename = "collisionCount", skip_serializing_if = "Option::is_none")]
    pub collision_count: Option<i32>,
}

/// Ordered set object description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderedSet {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: OrderedSetSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderedSetStatus>,
}

impl OrderedSet {
    pub fn new(metadata: ObjectMeta, spec: OrderedSetSpec) -> Self {
        Self {
            api_version: "replicore.io/v1".to_string(),
            kind: "OrderedSet".to_string(),
            metadata,
            spec,
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }
}
