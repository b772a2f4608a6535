//! `InstanceTracker` — the authoritative in-memory instance map.
//!
//! Per spec §3 ownership rules, the tracker exclusively owns this map; no
//! other component is allowed to mutate it directly. It exposes
//! synchronous snapshot reads for the scale algorithm's hot path
//! (`spec_instances_sync`, `count_spec_instances_sync`) and async reads for
//! wider queries, per spec §5. The tracker performs no I/O itself, so the
//! "async" methods exist purely for call-site symmetry with the rest of
//! the system; snapshots returned by either are point-in-time and may be
//! stale by the time a caller acts on them — the consumers (the scale
//! algorithm in particular) are specified to be idempotent under that
//! staleness.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use sched_core::{PathId, Timestamp};
use tracing::{debug, warn};

use crate::ids::InstanceId;
use crate::instance::Instance;
use crate::operation::{apply_operation, InstanceUpdateEffect, InstanceUpdateOperation};

/// The in-memory map of every known instance, keyed by instance id.
pub struct InstanceTracker {
    instances: RwLock<HashMap<InstanceId, Instance>>,
}

impl Default for InstanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceTracker {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Apply `op` to the instance named by the operation and commit the
    /// resulting effect (insert, update, or remove). Returns the effect so
    /// the caller can emit events / persist it.
    pub fn apply(&self, instance_id: &InstanceId, op: InstanceUpdateOperation, now: Timestamp) -> InstanceUpdateEffect {
        let mut guard = self.instances.write().expect("instance tracker lock poisoned");
        let effect = apply_operation(guard.get(instance_id), op, now);
        match &effect {
            InstanceUpdateEffect::Update { new, .. } => {
                guard.insert(instance_id.clone(), new.clone());
            }
            InstanceUpdateEffect::Expunge(instance) => {
                guard.remove(&instance.instance_id);
            }
            InstanceUpdateEffect::Noop(_) => {}
            InstanceUpdateEffect::Failure(err) => {
                debug!(%instance_id, %err, "instance update rejected");
            }
        }
        effect
    }

    /// Synchronous snapshot of every instance of `run_spec_id`. Used by the
    /// scale algorithm, which must not await while computing its decision.
    pub fn spec_instances_sync(&self, run_spec_id: &PathId) -> Vec<Instance> {
        let guard = self.instances.read().expect("instance tracker lock poisoned");
        guard
            .values()
            .filter(|i| i.run_spec_id() == run_spec_id)
            .cloned()
            .collect()
    }

    /// Synchronous count of instances of `run_spec_id`.
    pub fn count_spec_instances_sync(&self, run_spec_id: &PathId) -> usize {
        let guard = self.instances.read().expect("instance tracker lock poisoned");
        guard.values().filter(|i| i.run_spec_id() == run_spec_id).count()
    }

    /// Every run spec id with at least one tracked instance — the
    /// `trackerSpecIds` set used by orphan detection (spec §4.2).
    pub fn known_spec_ids_sync(&self) -> HashSet<PathId> {
        let guard = self.instances.read().expect("instance tracker lock poisoned");
        guard.values().map(|i| i.run_spec_id().clone()).collect()
    }

    /// A single instance by id, if known.
    pub async fn instance(&self, id: &InstanceId) -> Option<Instance> {
        let guard = self.instances.read().expect("instance tracker lock poisoned");
        guard.get(id).cloned()
    }

    /// All instances of `run_spec_id`.
    pub async fn spec_instances(&self, run_spec_id: &PathId) -> Vec<Instance> {
        self.spec_instances_sync(run_spec_id)
    }

    /// A snapshot of every tracked instance, across all run specs.
    pub async fn snapshot(&self) -> Vec<Instance> {
        let guard = self.instances.read().expect("instance tracker lock poisoned");
        guard.values().cloned().collect()
    }

    /// Directly remove an instance, bypassing the state machine. Used when
    /// a downstream caller (e.g. a confirmed broker terminal status after a
    /// kill) already decided the outcome and only needs the row dropped.
    pub fn remove(&self, id: &InstanceId) -> Option<Instance> {
        let mut guard = self.instances.write().expect("instance tracker lock poisoned");
        let removed = guard.remove(id);
        if removed.is_none() {
            warn!(%id, "attempted to remove an instance the tracker did not know about");
        }
        removed
    }
}
