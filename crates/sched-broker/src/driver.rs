//! The narrow broker-driver interface the core consumes (spec §6).
//!
//! The wire protocol itself is out of scope; the core only needs these
//! three calls plus the callback path (status updates and offers), which
//! arrives through [`crate::launch_queue::LaunchQueue`] and the instance
//! tracker rather than through this trait.

use std::collections::HashSet;

use async_trait::async_trait;
use sched_instance::BrokerTaskStatus;

use crate::error::BrokerError;

/// The resource broker's driver surface, as consumed by Scheduler Actions.
#[async_trait]
pub trait BrokerDriver: Send + Sync {
    /// Ask the broker to report authoritative state for `statuses`, and —
    /// when `statuses` is empty — to additionally report on any task it
    /// knows about that the core doesn't (the "implicit" reconcile).
    async fn reconcile_tasks(&self, statuses: HashSet<BrokerTaskStatus>) -> Result<(), BrokerError>;

    /// Acknowledge a previously routed status update.
    async fn acknowledge_status_update(&self, status: &BrokerTaskStatus) -> Result<(), BrokerError>;

    /// Disconnect the driver. `failover` indicates whether the framework
    /// should be allowed to reconnect and reclaim its tasks.
    async fn stop(&self, failover: bool) -> Result<(), BrokerError>;
}
