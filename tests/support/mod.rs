use replicore::replicore::controller::context::ReconcileContext;
use replicore::replicore::controller::control::SetControl;
use replicore::replicore::controller::identity::new_replica;
use replicore::replicore::controller::replica_control::ReplicaControl;
use replicore::replicore::controller::revision::{sort_revisions, RevisionStore};
use replicore::replicore::controller::status::StatusWriter;
use replicore::replicore::controller::ControlError;
use replicore::replicore::events::in_memory::InMemoryEventRecorder;
use replicore::replicore::model::replica::{
    ObjectMeta, Replica, ReplicaPhase, LABEL_REVISION,
};
use replicore::replicore::model::revision::RevisionRecord;
use replicore::replicore::model::set::{
    LabelSelector, OrderedSet, OrderedSetSpec, OrderedSetStatus, ReplicaTemplateSpec,
    UpdateStrategy,
};
use replicore::replicore::util::new_error;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Platform mutation recorded by the fake collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAction {
    Create { name: String, revision: String },
    Update { name: String },
    Delete { name: String },
}

impl PlatformAction {
    pub fn is_delete_of(&self, expected: &str) -> bool {
        matches!(self, PlatformAction::Delete { name } if name == expected)
    }
}

/// In-memory stand-in for the platform, the revision store, and the status
/// writer. Records every mutation the driver issues and supports failure and
/// collision injection.
#[derive(Default)]
pub struct FakePlatform {
    pub actions: Mutex<Vec<PlatformAction>>,
    pub revisions: Mutex<HashMap<String, RevisionRecord>>,
    pub statuses: Mutex<Vec<OrderedSetStatus>>,
    pub revision_creates: AtomicU32,
    pub pending_collisions: AtomicU32,
    pub fail_deletes: AtomicBool,
}

impl FakePlatform {
    pub fn seed_revisions(&self, records: &[RevisionRecord]) {
        let mut guard = self.revisions.lock().unwrap();
        for record in records {
            guard.insert(record.name().to_string(), record.clone());
        }
    }

    pub fn stored_revisions(&self) -> Vec<RevisionRecord> {
        let mut records: Vec<RevisionRecord> =
            self.revisions.lock().unwrap().values().cloned().collect();
        sort_revisions(&mut records);
        records
    }

    pub fn stored_revision(&self, name: &str) -> Option<RevisionRecord> {
        self.revisions.lock().unwrap().get(name).cloned()
    }

    fn record(&self, action: PlatformAction) {
        self.actions.lock().unwrap().push(action);
    }
}

impl ReplicaControl for FakePlatform {
    fn create_replica(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        replica: &Replica,
    ) -> Result<(), ControlError> {
        self.record(PlatformAction::Create {
            name: replica.name().to_string(),
            revision: replica.revision_tag().to_string(),
        });
        Ok(())
    }

    fn update_replica(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        replica: Replica,
    ) -> Result<(), ControlError> {
        self.record(PlatformAction::Update {
            name: replica.name().to_string(),
        });
        Ok(())
    }

    fn delete_replica(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        replica: &Replica,
    ) -> Result<(), ControlError> {
        if self.fail_deletes.load(Ordering::Relaxed) {
            return Err(ControlError::Platform(new_error("delete rejected")));
        }
        self.record(PlatformAction::Delete {
            name: replica.name().to_string(),
        });
        Ok(())
    }
}

impl RevisionStore for FakePlatform {
    fn list_revisions(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        _: &LabelSelector,
    ) -> Result<Vec<RevisionRecord>, ControlError> {
        Ok(self.stored_revisions())
    }

    fn adopt_revision(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        revision: RevisionRecord,
    ) -> Result<RevisionRecord, ControlError> {
        Ok(revision)
    }

    fn create_revision(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        revision: RevisionRecord,
    ) -> Result<RevisionRecord, ControlError> {
        if self.pending_collisions.load(Ordering::Relaxed) > 0 {
            self.pending_collisions.fetch_sub(1, Ordering::Relaxed);
            return Err(ControlError::RevisionCollision(
                revision.name().to_string(),
            ));
        }

        let mut guard = self.revisions.lock().unwrap();
        if let Some(existing) = guard.get(revision.name()) {
            if existing.data != revision.data {
                return Err(ControlError::RevisionCollision(
                    revision.name().to_string(),
                ));
            }
        }
        self.revision_creates.fetch_add(1, Ordering::Relaxed);
        guard.insert(revision.name().to_string(), revision.clone());
        Ok(revision)
    }

    fn update_revision(
        &self,
        _: &ReconcileContext,
        revision: &RevisionRecord,
        new_revision: i64,
    ) -> Result<RevisionRecord, ControlError> {
        let mut bumped = revision.clone();
        bumped.revision = new_revision;
        self.revisions
            .lock()
            .unwrap()
            .insert(bumped.name().to_string(), bumped.clone());
        Ok(bumped)
    }

    fn delete_revision(
        &self,
        _: &ReconcileContext,
        revision: &RevisionRecord,
    ) -> Result<(), ControlError> {
        self.revisions.lock().unwrap().remove(revision.name());
        Ok(())
    }
}

impl StatusWriter for FakePlatform {
    fn update_status(
        &self,
        _: &ReconcileContext,
        _: &OrderedSet,
        status: &OrderedSetStatus,
    ) -> Result<(), ControlError> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Wires a `SetControl` to one fake platform and an in-memory recorder.
pub struct ControlHarness {
    pub platform: Arc<FakePlatform>,
    pub recorder: Arc<InMemoryEventRecorder>,
    pub control: SetControl,
}

impl ControlHarness {
    pub fn new() -> Self {
        let platform = Arc::new(FakePlatform::default());
        let recorder = Arc::new(InMemoryEventRecorder::new());
        let control = SetControl::new(
            platform.clone(),
            platform.clone(),
            platform.clone(),
            recorder.clone(),
        );
        Self {
            platform,
            recorder,
            control,
        }
    }

    pub fn reconcile(&self, set: &OrderedSet, replicas: &[Replica]) -> Result<(), ControlError> {
        self.control
            .reconcile(&ReconcileContext::new(), set, replicas)
    }

    /// Drains and returns the platform mutations issued so far.
    pub fn drain_actions(&self) -> Vec<PlatformAction> {
        self.platform.actions.lock().unwrap().drain(..).collect()
    }

    pub fn last_status(&self) -> Option<OrderedSetStatus> {
        self.platform.statuses.lock().unwrap().last().cloned()
    }

    pub fn published_count(&self) -> usize {
        self.platform.statuses.lock().unwrap().len()
    }
}

/// A three-replica web set with a single templated container.
pub fn sample_set(name: &str, replicas: i32) -> OrderedSet {
    let mut selector = LabelSelector::default();
    selector
        .match_labels
        .insert("app".to_string(), name.to_string());

    let mut template = ReplicaTemplateSpec::default();
    template
        .metadata
        .labels
        .insert("app".to_string(), name.to_string());
    template.spec.containers = vec![replicore::replicore::model::replica::ContainerSpec {
        name: "app".to_string(),
        image: Some("registry.local/app:v1".to_string()),
        ..Default::default()
    }];

    OrderedSet::new(
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{name}")),
            ..Default::default()
        },
        OrderedSetSpec {
            service_name: name.to_string(),
            replicas,
            selector,
            template,
            update_strategy: UpdateStrategy::default(),
            revision_history_limit: None,
            claim_templates: Vec::new(),
            burst: false,
        },
    )
}

/// Returns the set with the template stamped to a new version.
pub fn with_version(set: &OrderedSet, version: &str) -> OrderedSet {
    let mut varied = set.clone();
    varied
        .spec
        .template
        .metadata
        .annotations
        .insert("version".to_string(), version.to_string());
    varied
}

/// An observed replica with correct identity and storage for its ordinal.
pub fn observed_replica(
    set: &OrderedSet,
    ordinal: u32,
    revision: &str,
    phase: ReplicaPhase,
    ready: bool,
) -> Replica {
    let mut replica = new_replica(set, ordinal);
    replica
        .metadata
        .labels
        .insert(LABEL_REVISION.to_string(), revision.to_string());
    replica.status.phase = Some(phase);
    replica.status.ready = ready;
    replica
}

pub fn healthy_replica(set: &OrderedSet, ordinal: u32, revision: &str) -> Replica {
    observed_replica(set, ordinal, revision, ReplicaPhase::Running, true)
}
