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

use super::replica::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity-only back-reference from a revision to its owning set. Name and
/// uid, never a pointer, so the data model stays a DAG.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Immutable snapshot of a set's replica template at a point in time.
///
/// `revision` increases monotonically per set; the name derives from the set
/// name, the template content hash, and the collision count. Two records are
/// equivalent when their `data` payloads are structurally equal, regardless
/// of name or revision number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevisionRecord {
    pub metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerReference>,
    pub revision: i64,
    /// Serialized replica template the revision captures.
    pub data: Value,
}

impl RevisionRecord {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }
}
