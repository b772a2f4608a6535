//! The command/reply contract (spec §4.1 "Commands and contracts").

use sched_broker::DeploymentId;
use sched_core::PathId;
use sched_deploy::{DeploymentPlan, DeploymentProgress};
use sched_instance::InstanceId;
use tokio::sync::oneshot;

use crate::error::ActorError;

/// One inbound command. `Deploy` and `KillTasks` carry their own payload;
/// the rest name only the id(s) they act on.
#[derive(Debug)]
pub enum Command {
    ReconcileTasks,
    /// Register health checks for every live instance's `runSpecVersion`
    /// and drop checks for versions with no live instances left, across
    /// every app. Self-sent after election and after every root-group
    /// change (spec §4.1/§4.6).
    ReconcileHealthChecks,
    ScaleApps,
    ScaleApp(PathId),
    Deploy { plan: DeploymentPlan, force: bool },
    CancelDeployment(DeploymentId),
    KillTasks { app_id: PathId, instances: Vec<InstanceId> },
    RetrieveRunningDeployments,
}

/// The actor's answer to a command, per the spec §4.1 contracts table.
#[derive(Debug)]
pub enum Reply {
    TasksReconciled,
    HealthChecksReconciled,
    /// `ScaleApps` has no answer; streamed `ScaleApp` sub-commands are
    /// fire-and-forget, each answered independently.
    Acknowledged,
    AppScaled(PathId),
    DeploymentStarted(DeploymentId),
    DeploymentFailed(DeploymentId),
    TasksKilled { app_id: PathId, instance_ids: Vec<InstanceId> },
    RunningDeployments(Vec<DeploymentProgress>),
    CommandFailed(ActorError),
}

/// One inbound command plus the channel its answer is sent back on. A
/// caller not interested in the reply may drop the receiver.
pub struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}
