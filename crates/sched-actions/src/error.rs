//! Errors surfaced by scheduler actions.

use thiserror::Error;

use sched_broker::BrokerError;
use sched_repo::RepoError;

#[derive(Debug, Clone, Error)]
pub enum ActionsError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("unknown run spec {0}")]
    UnknownRunSpec(sched_core::PathId),
}
