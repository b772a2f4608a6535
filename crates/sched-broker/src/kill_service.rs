//! The kill service — retried, reason-tagged instance/task termination.
//!
//! Per spec §5 ("There are no wall-clock timeouts on kills; kills are
//! retried by the kill service independently"), retry policy lives
//! entirely behind this trait; callers fire-and-forget a reasoned kill
//! request.

use async_trait::async_trait;
use sched_core::PathId;
use sched_instance::{InstanceId, TaskId};

use crate::error::BrokerError;

/// Why an instance or task is being killed. Carried through to the event
/// bus and to the kill service's own retry bookkeeping/logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    ScalingApp,
    Orphaned,
    DeletingApp,
    KillingTasksViaApi,
    FailedHealthChecks,
}

#[async_trait]
pub trait KillService: Send + Sync {
    /// Kill every instance in `instance_ids` belonging to `app_id`.
    async fn kill_instances(
        &self,
        app_id: &PathId,
        instance_ids: &[InstanceId],
        reason: KillReason,
    ) -> Result<(), BrokerError>;

    /// Kill a single task (used by the health check manager on
    /// `maxConsecutiveFailures`).
    async fn kill_task(&self, task_id: &TaskId, reason: KillReason) -> Result<(), BrokerError>;
}
