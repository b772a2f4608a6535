//! The Scheduler Actor (spec §4.1) — serializes cluster-wide scheduling
//! commands while leader, buffers them while standby, and enforces per-app
//! mutual exclusion via a lock table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use sched_actions::{reconcile_health_checks, reconcile_tasks, scale, ScaleDecision};
use sched_broker::{
    BrokerDriver, DeploymentId, EventBus, KillReason, KillService, LaunchQueue, LeaderElection,
    LeadershipEvent,
};
use sched_core::{CoreError, PathId};
use sched_deploy::{DeploymentManager, DeploymentPlan};
use sched_health::HealthCheckManager;
use sched_instance::{InstanceId, InstanceTracker};
use sched_repo::{GroupRepository, RepoError};
use sched_store::{EntityKind, PersistentStore};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::command::{Command, Envelope, Reply};
use crate::error::ActorError;

/// Default cancellation timeout before a forced deploy gives up waiting on
/// conflicting deployments to cancel (spec §4.1 "default 1 minute").
pub const CANCELLATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActorState {
    Suspended,
    Started,
    AwaitingCancellation,
}

/// Who currently holds a lock on an app's `PathId`, so a stale
/// lock-release message from a superseded deployment can't clear a lock
/// a newer one now holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockOwner {
    Deployment(DeploymentId),
    ScaleOrKill,
}

pub struct SchedulerActor {
    state: ActorState,
    locks: HashMap<PathId, LockOwner>,
    stash: VecDeque<Envelope>,
    repo: Arc<GroupRepository>,
    tracker: Arc<InstanceTracker>,
    deploy_manager: Arc<DeploymentManager>,
    health: Arc<HealthCheckManager>,
    kill_service: Arc<dyn KillService>,
    launch_queue: Arc<dyn LaunchQueue>,
    driver: Arc<dyn BrokerDriver>,
    store: Arc<dyn PersistentStore>,
    leader_election: Arc<dyn LeaderElection>,
    events: EventBus,
    lock_release_tx: mpsc::UnboundedSender<(DeploymentId, HashSet<PathId>)>,
    lock_release_rx: mpsc::UnboundedReceiver<(DeploymentId, HashSet<PathId>)>,
    cancellation_timeout: Duration,
}

impl SchedulerActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<GroupRepository>,
        tracker: Arc<InstanceTracker>,
        deploy_manager: Arc<DeploymentManager>,
        health: Arc<HealthCheckManager>,
        kill_service: Arc<dyn KillService>,
        launch_queue: Arc<dyn LaunchQueue>,
        driver: Arc<dyn BrokerDriver>,
        store: Arc<dyn PersistentStore>,
        leader_election: Arc<dyn LeaderElection>,
        events: EventBus,
    ) -> Self {
        let (lock_release_tx, lock_release_rx) = mpsc::unbounded_channel();
        Self {
            state: ActorState::Suspended,
            locks: HashMap::new(),
            stash: VecDeque::new(),
            repo,
            tracker,
            deploy_manager,
            health,
            kill_service,
            launch_queue,
            driver,
            store,
            leader_election,
            events,
            lock_release_tx,
            lock_release_rx,
            cancellation_timeout: CANCELLATION_TIMEOUT,
        }
    }

    /// Override the default cancellation timeout (spec §4.1 "default 1
    /// minute"), sourced from the daemon's config layer.
    pub fn with_cancellation_timeout(mut self, timeout: Duration) -> Self {
        self.cancellation_timeout = timeout;
        self
    }

    fn deployment_path(id: DeploymentId) -> PathId {
        PathId::parse(&format!("/_deployments/{}", id.0)).expect("uuid-derived path is always valid")
    }

    fn persist_plan(&self, plan: &DeploymentPlan) {
        match serde_json::to_vec(plan) {
            Ok(blob) => {
                if let Err(err) = self.store.store(EntityKind::Deployment, &Self::deployment_path(plan.id), plan.created_at, &blob) {
                    warn!(deployment = %plan.id, %err, "failed to persist deployment plan");
                }
            }
            Err(err) => warn!(deployment = %plan.id, %err, "failed to serialize deployment plan"),
        }
    }

    fn forget_plan(&self, id: DeploymentId) {
        if let Err(err) = self.store.delete_current(EntityKind::Deployment, &Self::deployment_path(id)) {
            warn!(deployment = %id, %err, "failed to remove persisted deployment plan");
        }
    }

    fn load_persisted_plans(&self) -> Vec<DeploymentPlan> {
        let ids = match self.store.ids(EntityKind::Deployment) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(%err, "failed to list persisted deployment plans");
                return Vec::new();
            }
        };
        ids.into_iter()
            .filter_map(|path| match self.store.get(EntityKind::Deployment, &path) {
                Ok(Some((_, blob))) => match serde_json::from_slice::<DeploymentPlan>(&blob) {
                    Ok(plan) => Some(plan),
                    Err(err) => {
                        warn!(%path, %err, "failed to deserialize persisted deployment plan");
                        None
                    }
                },
                Ok(None) => None,
                Err(err) => {
                    warn!(%path, %err, "failed to load persisted deployment plan");
                    None
                }
            })
            .collect()
    }

    /// Drive the actor to completion. Consumes `commands`; returns once the
    /// channel is closed.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Envelope>) {
        let mut leadership_rx = self.leader_election.subscribe();
        loop {
            tokio::select! {
                leadership = leadership_rx.recv() => {
                    match leadership {
                        Ok(LeadershipEvent::ElectedAsLeader) => self.on_elected().await,
                        Ok(LeadershipEvent::Standby) => self.on_standby().await,
                        Err(_) => break,
                    }
                }
                maybe_env = commands.recv() => {
                    match maybe_env {
                        Some(env) => self.handle_envelope(env).await,
                        None => break,
                    }
                }
                Some((owner, released)) = self.lock_release_rx.recv() => {
                    // Only release locks this deployment still owns — a
                    // superseded deployment's completion must not clear a
                    // lock a newer one since reacquired on the same app.
                    for id in released {
                        if self.locks.get(&id) == Some(&LockOwner::Deployment(owner)) {
                            self.locks.remove(&id);
                        }
                    }
                }
            }
        }
    }

    async fn on_elected(&mut self) {
        info!("elected as leader");
        for plan in self.load_persisted_plans() {
            let owner = LockOwner::Deployment(plan.id);
            for id in &plan.affected_run_spec_ids {
                self.locks.insert(id.clone(), owner);
            }
            self.spawn_deploy(plan);
        }
        self.state = ActorState::Started;
        self.replay_stash().await;
        self.handle_command(Command::ReconcileHealthChecks).await;
    }

    async fn on_standby(&mut self) {
        info!("standby: suspending");
        self.health.remove_all().await;
        self.deploy_manager.stop_all_deployments().await;
        self.locks.clear();
        self.state = ActorState::Suspended;
    }

    async fn replay_stash(&mut self) {
        let pending: Vec<Envelope> = self.stash.drain(..).collect();
        for env in pending {
            self.handle_envelope(env).await;
        }
    }

    /// Dispatch one command and send its reply, unless the actor is not
    /// currently `started`, in which case the envelope is stashed for
    /// replay once it transitions back.
    async fn handle_envelope(&mut self, env: Envelope) {
        if self.state != ActorState::Started {
            self.stash.push_back(env);
            return;
        }
        let reply = self.handle_command(env.command).await;
        let _ = env.reply.send(reply);
    }

    async fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::ReconcileTasks => self.handle_reconcile_tasks().await,
            Command::ReconcileHealthChecks => self.handle_reconcile_health_checks().await,
            Command::ScaleApps => self.handle_scale_apps().await,
            Command::ScaleApp(id) => self.handle_scale_app(id).await,
            Command::Deploy { plan, force } => self.handle_deploy(plan, force).await,
            Command::CancelDeployment(id) => self.handle_cancel_deployment(id).await,
            Command::KillTasks { app_id, instances } => self.handle_kill_tasks(app_id, instances).await,
            Command::RetrieveRunningDeployments => {
                Reply::RunningDeployments(self.deploy_manager.retrieve_running_deployments().await)
            }
        }
    }

    /// `ReconcileTasks`. The actor's `run()` loop handles one command to
    /// completion before the next, so at most one reconciliation is ever
    /// in flight — no separate dedup bookkeeping is needed.
    async fn handle_reconcile_tasks(&mut self) -> Reply {
        let result = reconcile_tasks(&self.repo, &self.tracker, self.driver.as_ref(), &self.kill_service).await;
        match result {
            Ok(()) => Reply::TasksReconciled,
            Err(err) => Reply::CommandFailed(ActorError::Actions(err)),
        }
    }

    /// `ReconcileHealthChecks` (spec §4.6): re-register checks for every
    /// live instance's `runSpecVersion` and drop checks for versions with
    /// no live instances left, across every app.
    async fn handle_reconcile_health_checks(&mut self) -> Reply {
        match reconcile_health_checks(&self.repo, &self.tracker, &self.health, &self.events).await {
            Ok(()) => Reply::HealthChecksReconciled,
            Err(err) => Reply::CommandFailed(ActorError::Actions(err)),
        }
    }

    async fn handle_scale_apps(&mut self) -> Reply {
        let ids = match self.repo.ids() {
            Ok(ids) => ids,
            Err(err) => return Reply::CommandFailed(ActorError::Repo(err)),
        };
        for id in ids {
            let _ = self.handle_scale_app(id).await;
        }
        Reply::Acknowledged
    }

    async fn handle_scale_app(&mut self, id: PathId) -> Reply {
        if self.locks.contains_key(&id) {
            return Reply::CommandFailed(ActorError::AppLocked(vec![id]));
        }
        self.locks.insert(id.clone(), LockOwner::ScaleOrKill);
        let result = self.scale_app_inner(&id).await;
        self.locks.remove(&id);
        match result {
            Ok(()) => Reply::AppScaled(id),
            Err(err) => Reply::CommandFailed(err),
        }
    }

    async fn scale_app_inner(&self, id: &PathId) -> Result<(), ActorError> {
        let run_spec = self
            .repo
            .get(id)
            .map_err(ActorError::Repo)?
            .ok_or_else(|| ActorError::Repo(RepoError::Validation(CoreError::UnknownApp(id.clone()))))?;
        let instances = self.tracker.spec_instances(id).await;
        let queue_entry = self.launch_queue.get(id).await.map_err(ActorError::Broker)?;
        let decision = scale(&run_spec, &instances, queue_entry.as_ref());
        self.apply_scale_decision(id, decision).await
    }

    async fn apply_scale_decision(&self, id: &PathId, decision: ScaleDecision) -> Result<(), ActorError> {
        match decision {
            ScaleDecision::ScaleUp { count } => self.launch_queue.add(id, count).await.map_err(ActorError::Broker),
            ScaleDecision::ScaleDown { victims } => {
                self.launch_queue.purge(id).await.map_err(ActorError::Broker)?;
                if !victims.is_empty() {
                    self.kill_service.kill_instances(id, &victims, KillReason::ScalingApp).await.map_err(ActorError::Broker)?;
                }
                Ok(())
            }
            ScaleDecision::Equal => Ok(()),
        }
    }

    /// `Deploy(plan, force)`. On a lock conflict with `force=false`, fails
    /// immediately. On `force=true`, cancels the conflicting deployments
    /// and waits up to `CANCELLATION_TIMEOUT` for them to clear before
    /// proceeding; a command arriving on the channel during that wait is
    /// processed only once this returns (the mailbox naturally defers it,
    /// the same externally observable effect as an explicit stash).
    async fn handle_deploy(&mut self, plan: DeploymentPlan, force: bool) -> Reply {
        let conflicts: Vec<PathId> = plan.affected_run_spec_ids.iter().filter(|id| self.locks.contains_key(*id)).cloned().collect();
        if conflicts.is_empty() {
            self.lock_for_deploy(&plan);
            self.persist_plan(&plan);
            let id = plan.id;
            self.spawn_deploy(plan);
            return Reply::DeploymentStarted(id);
        }
        if !force {
            return Reply::CommandFailed(ActorError::AppLocked(conflicts));
        }

        self.state = ActorState::AwaitingCancellation;
        let cancel_result = tokio::time::timeout(self.cancellation_timeout, self.deploy_manager.cancel_conflicting_deployments(&plan)).await;
        self.state = ActorState::Started;

        match cancel_result {
            Ok(_) => {
                self.lock_for_deploy(&plan);
                self.persist_plan(&plan);
                let id = plan.id;
                self.spawn_deploy(plan);
                Reply::DeploymentStarted(id)
            }
            Err(_) => Reply::CommandFailed(ActorError::Timeout),
        }
    }

    fn lock_for_deploy(&mut self, plan: &DeploymentPlan) {
        let owner = LockOwner::Deployment(plan.id);
        for id in &plan.affected_run_spec_ids {
            self.locks.insert(id.clone(), owner);
        }
    }

    /// Run `plan` in the background; release its locks and forget its
    /// persisted copy once the worker finishes, however it finishes. The
    /// release message carries `plan.id` so the run loop only clears locks
    /// this plan still owns (see `LockOwner`). `perform_deployment` itself
    /// publishes the success/failure event.
    fn spawn_deploy(&self, plan: DeploymentPlan) {
        let manager = self.deploy_manager.clone();
        let store = self.store.clone();
        let lock_release_tx = self.lock_release_tx.clone();
        let affected = plan.affected_run_spec_ids.clone();
        let id = plan.id;
        tokio::spawn(async move {
            let _ = manager.perform_deployment(plan).await;
            let _ = store.delete_current(EntityKind::Deployment, &Self::deployment_path(id));
            let _ = lock_release_tx.send((id, affected));
        });
    }

    async fn handle_cancel_deployment(&mut self, id: DeploymentId) -> Reply {
        self.forget_plan(id);
        let _ = self.deploy_manager.cancel_deployment(id).await;
        Reply::DeploymentFailed(id)
    }

    async fn handle_kill_tasks(&mut self, app_id: PathId, instances: Vec<InstanceId>) -> Reply {
        if self.locks.contains_key(&app_id) {
            return Reply::CommandFailed(ActorError::AppLocked(vec![app_id]));
        }
        self.locks.insert(app_id.clone(), LockOwner::ScaleOrKill);
        let result = self.kill_and_rescale(&app_id, &instances).await;
        self.locks.remove(&app_id);
        match result {
            Ok(()) => Reply::TasksKilled { app_id, instance_ids: instances },
            Err(err) => Reply::CommandFailed(err),
        }
    }

    async fn kill_and_rescale(&self, app_id: &PathId, instances: &[InstanceId]) -> Result<(), ActorError> {
        self.kill_service.kill_instances(app_id, instances, KillReason::KillingTasksViaApi).await.map_err(ActorError::Broker)?;
        self.scale_app_inner(app_id).await
    }
}
