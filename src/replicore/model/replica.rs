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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label tying replicas back to their owning set.
pub const LABEL_SET_NAME: &str = "replicore.io/set-name";
/// Label carrying the replica's own stable name for selector-based lookup.
pub const LABEL_REPLICA_NAME: &str = "replicore.io/replica-name";
/// Label recording the revision a replica was materialized from. Written at
/// creation and never mutated afterwards.
pub const LABEL_REVISION: &str = "replicore.io/revision";

/// Minimal object metadata shared by every resource the core handles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    pub name: Option<String>,
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
    #[serde(rename = "resourceVersion", skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(rename = "creationTimestamp", skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "deletionTimestamp", skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

/// Minimal container description carried inside replica templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Reference from a replica volume to a bound storage claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageClaimSource {
    #[serde(rename = "claimName")]
    pub claim_name: String,
}

/// Volume attached to a replica. Only claim-backed volumes matter to the
/// core; other sources pass through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeSpec {
    pub name: String,
    #[serde(rename = "storageClaim", skip_serializing_if = "Option::is_none")]
    pub storage_claim: Option<StorageClaimSource>,
}

/// Replica runtime specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReplicaSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,
}

/// Lifecycle phase reported by the platform for an observed replica.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReplicaPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Observed replica state. `phase` is `None` for descriptors that have not
/// been materialized on the platform yet (synthetic placeholders).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReplicaStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ReplicaPhase>,
    #[serde(default)]
    pub ready: bool,
}

/// One member of an ordered set, identified by the ordinal suffix of its name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Replica {
    pub metadata: ObjectMeta,
    pub spec: ReplicaSpec,
    #[serde(default)]
    pub status: ReplicaStatus,
}

impl Replica {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    /// True once the platform has accepted the replica.
    pub fn is_created(&self) -> bool {
        self.status.phase.is_some()
    }

    /// True while a deletion is pending on a created replica.
    pub fn is_terminating(&self) -> bool {
        self.is_created() && self.metadata.deletion_timestamp.is_some()
    }

    pub fn is_running_and_ready(&self) -> bool {
        matches!(self.status.phase, Some(ReplicaPhase::Running)) && self.status.ready
    }

    /// Healthy replicas need no repair: running, ready, and not terminating.
    pub fn is_healthy(&self) -> bool {
        self.is_running_and_ready() && !self.is_terminating()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.phase, Some(ReplicaPhase::Failed))
    }

    /// The revision tag written at materialization time. Empty for replicas
    /// created before revision tracking or for malformed input.
    pub fn revision_tag(&self) -> &str {
        self.metadata
            .labels
            .get(LABEL_REVISION)
            .map(String::as_str)
            .unwrap_or("")
    }
}
