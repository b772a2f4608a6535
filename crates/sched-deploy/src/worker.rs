//! The deployment worker — walks a plan's steps in order, issuing scale/
//! kill/start calls via Scheduler Actions and waiting for each step to
//! settle before advancing (spec §4.3).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sched_actions::{scale, stop_app, ScaleDecision};
use sched_broker::{EventBus, KillReason, KillService, LaunchQueue};
use sched_core::RunSpec;
use sched_health::HealthCheckManager;
use sched_instance::InstanceTracker;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::plan::{DeploymentPlan, StepAction};

/// The interval between readiness polls while a step settles.
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long a single step may take to settle before the worker gives up and
/// treats the deployment as failed.
const STEP_READY_TIMEOUT: Duration = Duration::from_secs(120);

pub struct DeploymentWorker {
    pub tracker: Arc<InstanceTracker>,
    pub kill_service: Arc<dyn KillService>,
    pub launch_queue: Arc<dyn LaunchQueue>,
    pub health: Arc<HealthCheckManager>,
    pub events: EventBus,
}

impl DeploymentWorker {
    /// Run `plan` to completion, in step order, checking `cancel` between
    /// steps and during each step's readiness wait. `progress` is bumped to
    /// the index of the next step to run after each step settles, so a
    /// concurrent `RetrieveRunningDeployments` caller can report how far the
    /// plan has gotten.
    pub async fn run(&self, plan: &DeploymentPlan, progress: Arc<AtomicUsize>, mut cancel: watch::Receiver<bool>) -> Result<(), DeployError> {
        for step in &plan.steps {
            if *cancel.borrow() {
                return Err(DeployError::Canceled(plan.id));
            }

            debug!(deployment = %plan.id, app = %step.app_id, action = ?step.action, "executing deployment step");

            match step.action {
                StepAction::Stop => {
                    stop_app(&step.app_id, &self.tracker, &self.health, &self.kill_service, &self.launch_queue, &self.events).await?;
                }
                StepAction::Start | StepAction::Scale => {
                    let run_spec = plan
                        .target
                        .transitive_apps()
                        .get(&step.app_id)
                        .cloned()
                        .ok_or_else(|| DeployError::UnknownDeployment(plan.id))?
                        .clone();
                    self.apply_scale(&run_spec).await?;
                }
                StepAction::Restart => {
                    let run_spec = plan
                        .target
                        .transitive_apps()
                        .get(&step.app_id)
                        .cloned()
                        .ok_or_else(|| DeployError::UnknownDeployment(plan.id))?
                        .clone();
                    self.apply_restart(&run_spec).await?;
                }
            }

            self.wait_for_step_ready(plan, step, &mut cancel).await?;
            progress.fetch_add(1, Ordering::SeqCst);
        }

        info!(deployment = %plan.id, "deployment completed");
        Ok(())
    }

    async fn apply_scale(&self, run_spec: &RunSpec) -> Result<(), DeployError> {
        let instances = self.tracker.spec_instances(&run_spec.id).await;
        let queue_entry = self.launch_queue.get(&run_spec.id).await?;
        match scale(run_spec, &instances, queue_entry.as_ref()) {
            ScaleDecision::ScaleUp { count } => {
                self.launch_queue.add(&run_spec.id, count).await?;
            }
            ScaleDecision::ScaleDown { victims } => {
                self.launch_queue.purge(&run_spec.id).await?;
                if !victims.is_empty() {
                    self.kill_service.kill_instances(&run_spec.id, &victims, KillReason::ScalingApp).await?;
                }
            }
            ScaleDecision::Equal => {}
        }
        Ok(())
    }

    async fn apply_restart(&self, run_spec: &RunSpec) -> Result<(), DeployError> {
        let instances = self.tracker.spec_instances(&run_spec.id).await;
        let ids: Vec<_> = instances
            .iter()
            .filter(|i| i.state.status.counts_as_launched())
            .map(|i| i.instance_id.clone())
            .collect();
        if !ids.is_empty() {
            self.kill_service.kill_instances(&run_spec.id, &ids, KillReason::ScalingApp).await?;
        }
        self.launch_queue.add(&run_spec.id, run_spec.instances).await?;
        Ok(())
    }

    /// Wait until the step's app reaches its target instance count with
    /// every instance reporting healthy (or unset, for apps with no health
    /// checks), or until `STEP_READY_TIMEOUT` elapses, or `cancel` fires.
    async fn wait_for_step_ready(
        &self,
        plan: &DeploymentPlan,
        step: &crate::plan::DeploymentStep,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), DeployError> {
        if step.action == StepAction::Stop {
            return Ok(());
        }
        let target_count = plan
            .target
            .transitive_apps()
            .get(&step.app_id)
            .map(|a| a.instances)
            .unwrap_or(0);
        if target_count == 0 {
            return Ok(());
        }

        let deadline = tokio::time::Instant::now() + STEP_READY_TIMEOUT;
        loop {
            if *cancel.borrow() {
                return Err(DeployError::Canceled(plan.id));
            }
            let instances = self.tracker.spec_instances(&step.app_id).await;
            let ready = instances
                .iter()
                .filter(|i| i.is_launched() && i.state.healthy != Some(false))
                .count() as u32;
            if ready >= target_count {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(deployment = %plan.id, app = %step.app_id, ready, target_count, "step readiness timed out");
                return Err(DeployError::CancellationTimeout(plan.id));
            }
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = cancel.changed() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sched_broker::{BrokerError, QueuedInstanceInfo};
    use sched_core::{Group, NetworkMode, PathId, PortDefinition, PortProtocol, ResourceLimits, RunSpec, Timestamp, UpgradeStrategy, VersionInfo};
    use sched_instance::{InstanceId, TaskId};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopKillService {
        kills: AtomicUsize,
    }
    #[async_trait]
    impl KillService for NoopKillService {
        async fn kill_instances(&self, _: &sched_core::PathId, _: &[InstanceId], _: KillReason) -> Result<(), BrokerError> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn kill_task(&self, _: &TaskId, _: KillReason) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    struct RecordingQueue {
        adds: AtomicUsize,
        purges: AtomicUsize,
    }
    #[async_trait]
    impl LaunchQueue for RecordingQueue {
        async fn add(&self, _: &sched_core::PathId, _: u32) -> Result<(), BrokerError> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn get(&self, _: &sched_core::PathId) -> Result<Option<QueuedInstanceInfo>, BrokerError> {
            Ok(None)
        }
        async fn purge(&self, _: &sched_core::PathId) -> Result<(), BrokerError> {
            self.purges.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn reset_delay(&self, _: &sched_core::PathId) -> Result<(), BrokerError> {
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

    fn worker(kill_service: Arc<dyn KillService>, launch_queue: Arc<dyn LaunchQueue>) -> DeploymentWorker {
        DeploymentWorker {
            tracker: Arc::new(InstanceTracker::new()),
            health: Arc::new(HealthCheckManager::new(kill_service.clone())),
            kill_service,
            launch_queue,
            events: EventBus::default(),
        }
    }

    #[tokio::test]
    async fn canceled_before_start_returns_canceled_error() {
        let kill_service: Arc<dyn KillService> = Arc::new(NoopKillService { kills: AtomicUsize::new(0) });
        let launch_queue: Arc<dyn LaunchQueue> = Arc::new(RecordingQueue { adds: AtomicUsize::new(0), purges: AtomicUsize::new(0) });
        let w = worker(kill_service, launch_queue);

        let original = group(vec![]);
        let target = group(vec![run_spec("/a", 1)]);
        let plan = DeploymentPlan::build(&original, &target, Timestamp::now());

        let (_tx, rx) = watch::channel(true);
        let result = w.run(&plan, Arc::new(AtomicUsize::new(0)), rx).await;
        assert!(matches!(result, Err(DeployError::Canceled(_))));
    }

    #[tokio::test]
    async fn start_step_with_zero_target_instances_completes_without_waiting() {
        let kill_service: Arc<dyn KillService> = Arc::new(NoopKillService { kills: AtomicUsize::new(0) });
        let queue = Arc::new(RecordingQueue { adds: AtomicUsize::new(0), purges: AtomicUsize::new(0) });
        let launch_queue: Arc<dyn LaunchQueue> = queue.clone();
        let w = worker(kill_service, launch_queue);

        let original = group(vec![]);
        let target = group(vec![run_spec("/a", 0)]);
        let plan = DeploymentPlan::build(&original, &target, Timestamp::now());

        let (_tx, rx) = watch::channel(false);
        w.run(&plan, Arc::new(AtomicUsize::new(0)), rx).await.unwrap();
        assert_eq!(queue.adds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_step_purges_queue_and_kills_nothing_when_no_instances() {
        let kill_service = Arc::new(NoopKillService { kills: AtomicUsize::new(0) });
        let kill_dyn: Arc<dyn KillService> = kill_service.clone();
        let queue = Arc::new(RecordingQueue { adds: AtomicUsize::new(0), purges: AtomicUsize::new(0) });
        let launch_queue: Arc<dyn LaunchQueue> = queue.clone();
        let w = worker(kill_dyn, launch_queue);

        let original = group(vec![run_spec("/a", 1)]);
        let target = group(vec![]);
        let plan = DeploymentPlan::build(&original, &target, Timestamp::now());

        let (_tx, rx) = watch::channel(false);
        w.run(&plan, Arc::new(AtomicUsize::new(0)), rx).await.unwrap();
        assert_eq!(queue.purges.load(Ordering::SeqCst), 1);
        assert_eq!(kill_service.kills.load(Ordering::SeqCst), 0);
    }
}
