//! Errors surfaced by the health check manager.

use thiserror::Error;

use sched_broker::BrokerError;

#[derive(Debug, Clone, Error)]
pub enum HealthError {
    #[error("kill dispatch failed: {0}")]
    KillFailed(#[from] BrokerError),
}
