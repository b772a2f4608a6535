//! `HealthCheckManager` — per-task health check lifecycle (spec §4.6).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sched_broker::{EventBus, KillReason, KillService, SchedulerEvent};
use sched_core::{HealthCheckSpec, PathId, Timestamp};
use sched_instance::{Instance, InstanceStatus, TaskId};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::probe::ProbeResult;
use crate::tracker::{HealthStatus, HealthTracker};

/// Instance statuses for which health results are not dispatched to the
/// kill service — the task isn't meaningfully alive yet, or is already on
/// its way out.
pub fn should_dispatch(status: InstanceStatus) -> bool {
    !matches!(
        status,
        InstanceStatus::Staging
            | InstanceStatus::Unreachable
            | InstanceStatus::Gone
            | InstanceStatus::Dropped
    )
}

struct TrackedTask {
    address: String,
    version: Timestamp,
    checks: Vec<(HealthCheckSpec, HealthTracker)>,
}

/// Tracks every task currently under active health checking and owns the
/// decision to kill a task once it exceeds its configured failure budget.
pub struct HealthCheckManager {
    tasks: Mutex<HashMap<TaskId, TrackedTask>>,
    kill_service: Arc<dyn KillService>,
}

impl HealthCheckManager {
    pub fn new(kill_service: Arc<dyn KillService>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            kill_service,
        }
    }

    /// Register (or replace) health checks for a single task, tagged with
    /// the `runSpecVersion` of the instance it belongs to.
    pub async fn add(&self, task_id: TaskId, address: String, version: Timestamp, checks: Vec<HealthCheckSpec>) {
        let trackers = checks
            .into_iter()
            .map(|spec| {
                let tracker = HealthTracker::new(&spec);
                (spec, tracker)
            })
            .collect();
        let mut guard = self.tasks.lock().await;
        guard.insert(task_id, TrackedTask { address, version, checks: trackers });
    }

    /// Register the same check set for every task in `tasks` — used when an
    /// instance reaches a launched state and all of its tasks need the
    /// app's health checks attached at once.
    pub async fn add_all_for(&self, tasks: &[(TaskId, String)], version: Timestamp, checks: &[HealthCheckSpec]) {
        let mut guard = self.tasks.lock().await;
        for (task_id, address) in tasks {
            let trackers = checks
                .iter()
                .map(|spec| (spec.clone(), HealthTracker::new(spec)))
                .collect();
            guard.insert(
                task_id.clone(),
                TrackedTask {
                    address: address.clone(),
                    version,
                    checks: trackers,
                },
            );
        }
    }

    /// Remove every tracked task belonging to `run_spec_id`.
    pub async fn remove_all_for(&self, run_spec_id: &sched_core::PathId) {
        let mut guard = self.tasks.lock().await;
        guard.retain(|task_id, _| &task_id.instance_id.run_spec_id != run_spec_id);
    }

    /// Remove every tracked task.
    pub async fn remove_all(&self) {
        self.tasks.lock().await.clear();
    }

    /// Every task currently under health checking.
    pub async fn list(&self) -> Vec<TaskId> {
        self.tasks.lock().await.keys().cloned().collect()
    }

    /// The worst health status across a task's checks, if the task is
    /// tracked at all.
    pub async fn status(&self, task_id: &TaskId) -> Option<HealthStatus> {
        let guard = self.tasks.lock().await;
        guard.get(task_id).map(|t| worst_of(&t.checks))
    }

    /// A snapshot of every tracked task's worst health status.
    pub async fn statuses(&self) -> HashMap<TaskId, HealthStatus> {
        let guard = self.tasks.lock().await;
        guard
            .iter()
            .map(|(id, t)| (id.clone(), worst_of(&t.checks)))
            .collect()
    }

    /// Record a probe result for `task_id`'s check at `check_index`.
    ///
    /// If `instance_status` excludes dispatch (per [`should_dispatch`]), the
    /// result is recorded but never escalated to a kill. Otherwise, once the
    /// check's `maxConsecutiveFailures` is exceeded, the owning task is
    /// killed with [`KillReason::FailedHealthChecks`].
    pub async fn update(
        &self,
        task_id: &TaskId,
        check_index: usize,
        result: ProbeResult,
        instance_status: InstanceStatus,
    ) -> Option<HealthStatus> {
        let exceeded = {
            let mut guard = self.tasks.lock().await;
            let tracked = guard.get_mut(task_id)?;
            let (_, tracker) = tracked.checks.get_mut(check_index)?;
            tracker.record(result);
            tracker.exceeds_max_failures()
        };

        if exceeded && should_dispatch(instance_status) {
            warn!(%task_id, "task exceeded max consecutive health check failures, killing");
            if let Err(e) = self.kill_service.kill_task(task_id, KillReason::FailedHealthChecks).await {
                warn!(%task_id, error = %e, "failed to dispatch kill for unhealthy task");
            }
        } else if exceeded {
            debug!(%task_id, ?instance_status, "health check failure threshold exceeded but dispatch excluded");
        }

        self.status(task_id).await
    }

    /// The configured probe address for a tracked task, if any.
    pub async fn address_of(&self, task_id: &TaskId) -> Option<String> {
        self.tasks.lock().await.get(task_id).map(|t| t.address.clone())
    }

    /// Reconcile `app_id`'s tracked tasks against its current set of live
    /// instances (spec §4.6):
    ///
    /// 1. Register checks for every task of every live instance not already
    ///    tracked, tagged with that instance's `runSpecVersion`.
    /// 2. Remove checks for versions with no live instances left.
    ///
    /// One `HealthCheckAdded`/`HealthCheckRemoved` event is published per
    /// distinct version gained or lost, not per task.
    pub async fn reconcile_with(
        &self,
        app_id: &PathId,
        live_instances: &[Instance],
        checks: &[HealthCheckSpec],
        events: &EventBus,
    ) {
        let live_versions: HashSet<Timestamp> =
            live_instances.iter().map(|i| i.state.version).collect();

        let mut guard = self.tasks.lock().await;

        let mut removed_versions = HashSet::new();
        guard.retain(|task_id, tracked| {
            if &task_id.instance_id.run_spec_id != app_id {
                return true;
            }
            if live_versions.contains(&tracked.version) {
                return true;
            }
            removed_versions.insert(tracked.version);
            false
        });

        let mut added_versions = HashSet::new();
        for instance in live_instances {
            let version = instance.state.version;
            for task in instance.tasks.values() {
                if guard.contains_key(&task.id) {
                    continue;
                }
                let Some(address) = task.state.host_ports.first().map(|p| format!("{}:{p}", task.state.agent_info.host)) else {
                    continue;
                };
                let trackers = checks.iter().map(|spec| (spec.clone(), HealthTracker::new(spec))).collect();
                guard.insert(task.id.clone(), TrackedTask { address, version, checks: trackers });
                added_versions.insert(version);
            }
        }
        drop(guard);

        if !removed_versions.is_empty() || !added_versions.is_empty() {
            debug!(
                app = %app_id,
                removed = removed_versions.len(),
                added = added_versions.len(),
                "reconciled health checks"
            );
        }
        for version in removed_versions {
            events.publish(SchedulerEvent::HealthCheckRemoved { app_id: app_id.clone(), version });
        }
        for version in added_versions {
            events.publish(SchedulerEvent::HealthCheckAdded { app_id: app_id.clone(), version });
        }
    }
}

fn worst_of(checks: &[(HealthCheckSpec, HealthTracker)]) -> HealthStatus {
    if checks.iter().any(|(_, t)| t.status() == HealthStatus::Unhealthy) {
        return HealthStatus::Unhealthy;
    }
    if checks.iter().all(|(_, t)| t.status() == HealthStatus::Healthy) && !checks.is_empty() {
        return HealthStatus::Healthy;
    }
    HealthStatus::Unknown
}
