//! The launch queue — the external offer-matcher surface (spec §6, §3).
//!
//! Resource bin-packing itself is explicitly out of scope; the core only
//! needs to enqueue/cancel launch demand and read back the queue's view of
//! in-flight and unreachable instances for the scale algorithm.

use async_trait::async_trait;
use sched_core::PathId;

use crate::error::BrokerError;

/// The launch queue's view of one run spec's outstanding launch demand.
///
/// Invariant: `final_instance_count >= unreachable_instances` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedInstanceInfo {
    pub run_spec_id: PathId,
    pub instances_left_to_launch: u32,
    pub in_progress: bool,
    pub final_instance_count: u32,
    pub unreachable_instances: u32,
}

impl QueuedInstanceInfo {
    /// Number of instances the queue considers already accounted for
    /// (queued or running), excluding ones it knows to be unreachable.
    pub fn queued_or_running(&self) -> u32 {
        self.final_instance_count.saturating_sub(self.unreachable_instances)
    }
}

/// The external placement component that receives offers and produces
/// launch decisions for pending instances.
#[async_trait]
pub trait LaunchQueue: Send + Sync {
    /// Enqueue `count` additional launches for `run_spec_id`.
    async fn add(&self, run_spec_id: &PathId, count: u32) -> Result<(), BrokerError>;

    /// The queue's current view of `run_spec_id`, if it has any tracked
    /// demand.
    async fn get(&self, run_spec_id: &PathId) -> Result<Option<QueuedInstanceInfo>, BrokerError>;

    /// Remove all pending launch demand for `run_spec_id`.
    async fn purge(&self, run_spec_id: &PathId) -> Result<(), BrokerError>;

    /// Reset the queue's exponential-backoff delay for `run_spec_id` to its
    /// initial value.
    async fn reset_delay(&self, run_spec_id: &PathId) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_or_running_excludes_unreachable() {
        let info = QueuedInstanceInfo {
            run_spec_id: PathId::parse("/app").unwrap(),
            instances_left_to_launch: 0,
            in_progress: false,
            final_instance_count: 15,
            unreachable_instances: 5,
        };
        assert_eq!(info.queued_or_running(), 10);
    }
}
