//! Errors the actor hands back as `CommandFailed`.

use thiserror::Error;

use sched_core::PathId;

#[derive(Debug, Clone, Error)]
pub enum ActorError {
    #[error("locked by a running deployment: {0:?}")]
    AppLocked(Vec<PathId>),

    #[error("cancellation timed out")]
    Timeout,

    #[error("not currently the leader")]
    NotLeader,

    #[error(transparent)]
    Actions(#[from] sched_actions::ActionsError),

    #[error(transparent)]
    Deploy(#[from] sched_deploy::DeployError),

    #[error(transparent)]
    Repo(#[from] sched_repo::RepoError),

    #[error(transparent)]
    Broker(#[from] sched_broker::BrokerError),
}
