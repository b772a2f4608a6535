//! `DeploymentManager` — owns `runningDeployments` and spawns/cancels the
//! per-deployment workers (spec §4.3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sched_broker::{DeploymentId, EventBus, KillService, LaunchQueue, SchedulerEvent};
use sched_core::PathId;
use sched_health::HealthCheckManager;
use sched_instance::InstanceTracker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::DeployError;
use crate::plan::DeploymentPlan;
use crate::worker::DeploymentWorker;

/// Default cancellation timeout (spec §4.1 `Deploy(plan, force=true)`:
/// "schedule a cancellation-timeout (default 1 minute)").
pub const DEFAULT_CANCELLATION_TIMEOUT: Duration = Duration::from_secs(60);

struct RunningDeployment {
    plan: DeploymentPlan,
    cancel: watch::Sender<bool>,
    progress: Arc<AtomicUsize>,
    /// Taken by `await_and_remove` once it starts waiting on the worker.
    /// The entry itself stays in `running` until the worker actually
    /// terminates — only the handle moves out early.
    handle: Option<JoinHandle<Result<(), DeployError>>>,
    /// Carries the current value `false` for as long as the deployment is
    /// in flight and flips to `true` the instant it's removed from
    /// `running`, so a late subscriber (`cancel_deployment`) still observes
    /// completion even if it subscribes after the flip.
    finished: watch::Sender<bool>,
}

/// A running plan's id, its step count, and how many steps have settled —
/// the `RetrieveRunningDeployments` view.
#[derive(Debug, Clone)]
pub struct DeploymentProgress {
    pub plan: DeploymentPlan,
    pub completed_steps: usize,
    pub total_steps: usize,
}

pub struct DeploymentManager {
    running: tokio::sync::Mutex<HashMap<DeploymentId, RunningDeployment>>,
    tracker: Arc<InstanceTracker>,
    kill_service: Arc<dyn KillService>,
    launch_queue: Arc<dyn LaunchQueue>,
    health: Arc<HealthCheckManager>,
    events: EventBus,
    cancellation_timeout: Duration,
}

impl DeploymentManager {
    pub fn new(
        tracker: Arc<InstanceTracker>,
        kill_service: Arc<dyn KillService>,
        launch_queue: Arc<dyn LaunchQueue>,
        health: Arc<HealthCheckManager>,
        events: EventBus,
    ) -> Self {
        Self {
            running: tokio::sync::Mutex::new(HashMap::new()),
            tracker,
            kill_service,
            launch_queue,
            health,
            events,
            cancellation_timeout: DEFAULT_CANCELLATION_TIMEOUT,
        }
    }

    pub fn with_cancellation_timeout(mut self, timeout: Duration) -> Self {
        self.cancellation_timeout = timeout;
        self
    }

    /// Register `plan`, spawn its worker, and return once the worker has
    /// finished (successfully or not). The caller is responsible for
    /// translating the result into `DeploymentFinished`/`DeploymentFailed`.
    pub async fn perform_deployment(&self, plan: DeploymentPlan) -> Result<(), DeployError> {
        let worker = DeploymentWorker {
            tracker: self.tracker.clone(),
            kill_service: self.kill_service.clone(),
            launch_queue: self.launch_queue.clone(),
            health: self.health.clone(),
            events: self.events.clone(),
        };
        let progress = Arc::new(AtomicUsize::new(0));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (finished_tx, _) = watch::channel(false);

        let plan_for_worker = plan.clone();
        let progress_for_worker = progress.clone();
        let handle = tokio::spawn(async move { worker.run(&plan_for_worker, progress_for_worker, cancel_rx).await });

        {
            let mut guard = self.running.lock().await;
            guard.insert(
                plan.id,
                RunningDeployment { plan: plan.clone(), cancel: cancel_tx, progress, handle: Some(handle), finished: finished_tx.clone() },
            );
        }

        let result = self.await_and_remove(plan.id, finished_tx).await;
        match &result {
            Ok(()) => {
                self.events.publish(SchedulerEvent::DeploymentSuccess { deployment_id: plan.id });
                info!(deployment = %plan.id, "deployment finished");
            }
            Err(err) => {
                self.events.publish(SchedulerEvent::DeploymentFailed { deployment_id: plan.id, reason: err.to_string() });
                warn!(deployment = %plan.id, %err, "deployment failed");
            }
        }
        result
    }

    /// Wait for the worker to terminate, then remove its entry from
    /// `running`. The entry is kept in the table for the worker's entire
    /// run — `retrieve_running_deployments`/`cancel_deployment`/
    /// `cancel_conflicting_deployments` must see it as running the whole
    /// time, not just between insert and the start of this wait.
    async fn await_and_remove(&self, id: DeploymentId, finished: watch::Sender<bool>) -> Result<(), DeployError> {
        let handle = {
            let mut guard = self.running.lock().await;
            match guard.get_mut(&id) {
                Some(running) => running.handle.take(),
                None => None,
            }
        };
        let result = match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(_) => Err(DeployError::Canceled(id)),
            },
            None => return Err(DeployError::UnknownDeployment(id)),
        };
        self.running.lock().await.remove(&id);
        let _ = finished.send(true);
        result
    }

    /// Signal the worker for `id` to stop, then wait up to the configured
    /// cancellation timeout for it to actually terminate. The entry is
    /// removed by the `perform_deployment` task's own `await_and_remove`
    /// once the worker exits, not by this call.
    pub async fn cancel_deployment(&self, id: DeploymentId) -> Result<(), DeployError> {
        let (cancel_tx, mut finished_rx) = {
            let guard = self.running.lock().await;
            let running = guard.get(&id).ok_or(DeployError::UnknownDeployment(id))?;
            (running.cancel.clone(), running.finished.subscribe())
        };
        let _ = cancel_tx.send(true);

        let wait_for_termination = async {
            while !*finished_rx.borrow() {
                if finished_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        match tokio::time::timeout(self.cancellation_timeout, wait_for_termination).await {
            Ok(()) => {
                self.events.publish(SchedulerEvent::DeploymentFailed { deployment_id: id, reason: "canceled".into() });
                Err(DeployError::Canceled(id))
            }
            Err(_) => {
                warn!(deployment = %id, "cancellation timed out; worker may still be terminating");
                Err(DeployError::CancellationTimeout(id))
            }
        }
    }

    /// Cancel every running plan whose affected ids overlap `new_plan`'s.
    pub async fn cancel_conflicting_deployments(&self, new_plan: &DeploymentPlan) -> Vec<DeploymentId> {
        let conflicting: Vec<DeploymentId> = {
            let guard = self.running.lock().await;
            guard
                .values()
                .filter(|d| !d.plan.affected_run_spec_ids.is_disjoint(&new_plan.affected_run_spec_ids))
                .map(|d| d.plan.id)
                .collect()
        };
        for id in &conflicting {
            let _ = self.cancel_deployment(*id).await;
        }
        conflicting
    }

    /// Cancel every running deployment and clear the table.
    pub async fn stop_all_deployments(&self) {
        let ids: Vec<DeploymentId> = {
            let guard = self.running.lock().await;
            guard.keys().copied().collect()
        };
        for id in ids {
            let _ = self.cancel_deployment(id).await;
        }
    }

    /// Every currently running plan with its step progress.
    pub async fn retrieve_running_deployments(&self) -> Vec<DeploymentProgress> {
        let guard = self.running.lock().await;
        guard
            .values()
            .map(|d| DeploymentProgress {
                plan: d.plan.clone(),
                completed_steps: d.progress.load(Ordering::SeqCst),
                total_steps: d.plan.steps.len(),
            })
            .collect()
    }

    /// Whether any running plan has `app_id` among its affected ids — used
    /// by the actor's lock table to decide whether `withLockFor` would
    /// succeed before attempting a new `Deploy`.
    pub async fn is_locked(&self, app_id: &PathId) -> bool {
        let guard = self.running.lock().await;
        guard.values().any(|d| d.plan.affected_run_spec_ids.contains(app_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sched_broker::{BrokerError, KillReason, QueuedInstanceInfo};
    use sched_core::{Group, NetworkMode, PortDefinition, PortProtocol, ResourceLimits, RunSpec, Timestamp, UpgradeStrategy, VersionInfo};
    use sched_instance::{InstanceId, TaskId};
    use std::collections::BTreeMap;

    struct NoopKillService;
    #[async_trait]
    impl KillService for NoopKillService {
        async fn kill_instances(&self, _: &PathId, _: &[InstanceId], _: KillReason) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn kill_task(&self, _: &TaskId, _: KillReason) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    struct NoopQueue;
    #[async_trait]
    impl LaunchQueue for NoopQueue {
        async fn add(&self, _: &PathId, _: u32) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn get(&self, _: &PathId) -> Result<Option<QueuedInstanceInfo>, BrokerError> {
            Ok(None)
        }
        async fn purge(&self, _: &PathId) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn reset_delay(&self, _: &PathId) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    fn run_spec(id: &str, instances: u32) -> RunSpec {
        RunSpec {
            id: PathId::parse(id).unwrap(),
            command: "run".into(),
            args: vec![],
            resources: ResourceLimits { cpu_shares: 1.0, mem_bytes: 1, disk_bytes: 0, gpu: 0 },
            instances,
            network: NetworkMode::Ports(vec![PortDefinition { name: "http".into(), container_port: Some(80), protocol: PortProtocol::Tcp }]),
            health_checks: vec![],
            upgrade_strategy: UpgradeStrategy::default(),
            dependencies: vec![],
            residency: None,
            secrets: BTreeMap::new(),
            version_info: VersionInfo::fresh_at(Timestamp::now()),
        }
    }

    fn group(apps: Vec<RunSpec>) -> Group {
        let mut map = BTreeMap::new();
        for app in apps {
            map.insert(app.id.clone(), app);
        }
        Group { id: PathId::root(), apps: map, subgroups: BTreeMap::new(), dependencies: vec![], version: VersionInfo::fresh_at(Timestamp::now()) }
    }

    fn manager() -> DeploymentManager {
        let kill_service: Arc<dyn KillService> = Arc::new(NoopKillService);
        DeploymentManager::new(
            Arc::new(InstanceTracker::new()),
            kill_service.clone(),
            Arc::new(NoopQueue),
            Arc::new(HealthCheckManager::new(kill_service)),
            EventBus::default(),
        )
    }

    #[tokio::test]
    async fn perform_deployment_with_zero_instance_steps_completes_immediately() {
        let mgr = manager();
        let original = group(vec![]);
        let target = group(vec![run_spec("/a", 0)]);
        let plan = DeploymentPlan::build(&original, &target, Timestamp::now());
        mgr.perform_deployment(plan).await.unwrap();
        assert!(mgr.retrieve_running_deployments().await.is_empty());
    }

    #[tokio::test]
    async fn cancel_unknown_deployment_is_an_error() {
        let mgr = manager();
        let result = mgr.cancel_deployment(DeploymentId::new()).await;
        assert!(matches!(result, Err(DeployError::UnknownDeployment(_))));
    }

    #[tokio::test]
    async fn cancel_conflicting_deployments_only_targets_overlapping_plans() {
        let mgr = Arc::new(manager());
        let original = group(vec![]);
        let target_a = group(vec![run_spec("/a", 1)]);
        let plan_a = DeploymentPlan::build(&original, &target_a, Timestamp::now());
        let running_a_id = plan_a.id;

        let mgr_clone = mgr.clone();
        let plan_a_clone = plan_a.clone();
        let spawned = tokio::spawn(async move { mgr_clone.perform_deployment(plan_a_clone).await });
        tokio::task::yield_now().await;

        let target_b = group(vec![run_spec("/a", 3)]);
        let plan_b = DeploymentPlan::build(&original, &target_b, Timestamp::now());
        let conflicting = mgr.cancel_conflicting_deployments(&plan_b).await;
        assert_eq!(conflicting, vec![running_a_id]);

        let _ = spawned.await;
    }

    #[tokio::test]
    async fn deployment_stays_in_running_table_for_its_whole_execution() {
        let mgr = Arc::new(manager());
        let original = group(vec![]);
        // A nonzero instance count the worker can never satisfy (no launch
        // queue backing it with real instances) keeps the step readiness
        // wait — and so the deployment — in progress until canceled.
        let target = group(vec![run_spec("/a", 1)]);
        let plan = DeploymentPlan::build(&original, &target, Timestamp::now());
        let id = plan.id;

        let mgr_clone = mgr.clone();
        let spawned = tokio::spawn(async move { mgr_clone.perform_deployment(plan).await });
        tokio::task::yield_now().await;

        let running = mgr.retrieve_running_deployments().await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].plan.id, id);
        assert!(mgr.is_locked(&PathId::parse("/a").unwrap()).await);

        let result = mgr.cancel_deployment(id).await;
        assert!(matches!(result, Err(DeployError::Canceled(_))));
        assert!(mgr.retrieve_running_deployments().await.is_empty());

        let _ = spawned.await;
    }
}
