//! Errors surfaced by the deployment manager.

use thiserror::Error;

use sched_broker::{BrokerError, DeploymentId};
use sched_core::CoreError;

#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Repo(#[from] sched_repo::RepoError),

    #[error(transparent)]
    Actions(#[from] sched_actions::ActionsError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("deployment {0} was canceled")]
    Canceled(DeploymentId),

    #[error("deployment {0} timed out waiting for cancellation")]
    CancellationTimeout(DeploymentId),

    #[error("no deployment {0} is currently running")]
    UnknownDeployment(DeploymentId),

    #[error("app(s) {0:?} are locked by a running deployment")]
    AppLocked(Vec<sched_core::PathId>),
}
