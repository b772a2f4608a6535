//! `ActorHandle` — the external entry point into the scheduler actor.
//!
//! Wraps the `mpsc::Sender<Envelope>` side of the channel with one async
//! method per command, so callers (the HTTP API, the CLI, reconciliation
//! timers) never construct a `Command`/`Envelope` by hand.

use sched_broker::DeploymentId;
use sched_core::PathId;
use sched_deploy::{DeploymentPlan, DeploymentProgress};
use sched_instance::InstanceId;
use tokio::sync::{mpsc, oneshot};

use crate::command::{Command, Envelope, Reply};
use crate::error::ActorError;

/// Channel depth for the actor's inbound command queue.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ActorHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ActorHandle {
    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }

    /// Build a bound sender/receiver pair sized for the actor's mailbox.
    pub fn channel() -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    async fn send(&self, command: Command) -> Result<Reply, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply: reply_tx })
            .await
            .map_err(|_| ActorError::NotLeader)?;
        reply_rx.await.map_err(|_| ActorError::NotLeader)
    }

    pub async fn reconcile_tasks(&self) -> Result<(), ActorError> {
        match self.send(Command::ReconcileTasks).await? {
            Reply::TasksReconciled => Ok(()),
            Reply::CommandFailed(err) => Err(err),
            _ => Ok(()),
        }
    }

    pub async fn reconcile_health_checks(&self) -> Result<(), ActorError> {
        match self.send(Command::ReconcileHealthChecks).await? {
            Reply::HealthChecksReconciled => Ok(()),
            Reply::CommandFailed(err) => Err(err),
            _ => Ok(()),
        }
    }

    pub async fn scale_apps(&self) -> Result<(), ActorError> {
        match self.send(Command::ScaleApps).await? {
            Reply::CommandFailed(err) => Err(err),
            _ => Ok(()),
        }
    }

    pub async fn scale_app(&self, id: PathId) -> Result<PathId, ActorError> {
        match self.send(Command::ScaleApp(id)).await? {
            Reply::AppScaled(id) => Ok(id),
            Reply::CommandFailed(err) => Err(err),
            _ => unreachable!("ScaleApp always answers with AppScaled or CommandFailed"),
        }
    }

    pub async fn deploy(&self, plan: DeploymentPlan, force: bool) -> Result<DeploymentId, ActorError> {
        match self.send(Command::Deploy { plan, force }).await? {
            Reply::DeploymentStarted(id) => Ok(id),
            Reply::CommandFailed(err) => Err(err),
            _ => unreachable!("Deploy always answers with DeploymentStarted or CommandFailed"),
        }
    }

    pub async fn cancel_deployment(&self, id: DeploymentId) -> Result<(), ActorError> {
        match self.send(Command::CancelDeployment(id)).await? {
            Reply::DeploymentFailed(_) => Ok(()),
            Reply::CommandFailed(err) => Err(err),
            _ => unreachable!("CancelDeployment always answers with DeploymentFailed or CommandFailed"),
        }
    }

    pub async fn kill_tasks(&self, app_id: PathId, instances: Vec<InstanceId>) -> Result<(), ActorError> {
        match self.send(Command::KillTasks { app_id, instances }).await? {
            Reply::TasksKilled { .. } => Ok(()),
            Reply::CommandFailed(err) => Err(err),
            _ => unreachable!("KillTasks always answers with TasksKilled or CommandFailed"),
        }
    }

    pub async fn retrieve_running_deployments(&self) -> Result<Vec<DeploymentProgress>, ActorError> {
        match self.send(Command::RetrieveRunningDeployments).await? {
            Reply::RunningDeployments(progress) => Ok(progress),
            Reply::CommandFailed(err) => Err(err),
            _ => unreachable!("RetrieveRunningDeployments always answers with RunningDeployments or CommandFailed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Envelope;

    #[tokio::test]
    async fn dropped_receiver_surfaces_as_not_leader() {
        let (handle, rx) = ActorHandle::channel();
        drop(rx);
        let err = handle.scale_apps().await.unwrap_err();
        assert!(matches!(err, ActorError::NotLeader));
    }

    #[tokio::test]
    async fn send_delivers_envelope_to_receiver() {
        let (handle, mut rx) = ActorHandle::channel();
        let task = tokio::spawn(async move { handle.reconcile_tasks().await });
        let Envelope { command, reply } = rx.recv().await.expect("envelope delivered");
        assert!(matches!(command, Command::ReconcileTasks));
        reply.send(Reply::TasksReconciled).unwrap();
        assert!(task.await.unwrap().is_ok());
    }
}
