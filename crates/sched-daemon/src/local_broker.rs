//! Standalone stand-ins for the external broker-facing traits.
//!
//! The broker wire protocol is out of scope (spec §1's Non-goals); a
//! `standalone` run has no real broker to place instances for it, so these
//! implementations only track declared demand and answer every call
//! successfully, the same role `StandaloneLeaderElection` plays for leader
//! election in a single-node deployment.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use sched_broker::{BrokerDriver, BrokerError, KillReason, KillService, LaunchQueue, QueuedInstanceInfo};
use sched_core::PathId;
use sched_instance::{BrokerTaskStatus, InstanceId, TaskId};
use tracing::debug;

/// Tracks requested launch counts without ever satisfying them — there is
/// no broker attached in standalone mode to turn demand into instances.
#[derive(Default)]
pub struct LocalLaunchQueue {
    demand: Mutex<HashMap<PathId, u32>>,
}

impl LocalLaunchQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LaunchQueue for LocalLaunchQueue {
    async fn add(&self, run_spec_id: &PathId, count: u32) -> Result<(), BrokerError> {
        let mut demand = self.demand.lock().unwrap();
        *demand.entry(run_spec_id.clone()).or_insert(0) += count;
        debug!(%run_spec_id, count, "queued launch demand (no broker attached)");
        Ok(())
    }

    async fn get(&self, run_spec_id: &PathId) -> Result<Option<QueuedInstanceInfo>, BrokerError> {
        let demand = self.demand.lock().unwrap();
        Ok(demand.get(run_spec_id).map(|&instances_left_to_launch| QueuedInstanceInfo {
            run_spec_id: run_spec_id.clone(),
            instances_left_to_launch,
            in_progress: instances_left_to_launch > 0,
            final_instance_count: 0,
            unreachable_instances: 0,
        }))
    }

    async fn purge(&self, run_spec_id: &PathId) -> Result<(), BrokerError> {
        self.demand.lock().unwrap().remove(run_spec_id);
        Ok(())
    }

    async fn reset_delay(&self, _run_spec_id: &PathId) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// Logs kill requests; there is no broker connection to actually relay them
/// to in standalone mode.
pub struct LocalKillService;

#[async_trait]
impl KillService for LocalKillService {
    async fn kill_instances(&self, app_id: &PathId, instance_ids: &[InstanceId], reason: KillReason) -> Result<(), BrokerError> {
        debug!(%app_id, count = instance_ids.len(), ?reason, "kill requested (no broker attached)");
        Ok(())
    }

    async fn kill_task(&self, task_id: &TaskId, reason: KillReason) -> Result<(), BrokerError> {
        debug!(%task_id, ?reason, "task kill requested (no broker attached)");
        Ok(())
    }
}

/// No-op broker driver for standalone mode.
pub struct LocalBrokerDriver;

#[async_trait]
impl BrokerDriver for LocalBrokerDriver {
    async fn reconcile_tasks(&self, statuses: HashSet<BrokerTaskStatus>) -> Result<(), BrokerError> {
        debug!(count = statuses.len(), "reconcile requested (no broker attached)");
        Ok(())
    }

    async fn acknowledge_status_update(&self, _status: &BrokerTaskStatus) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn stop(&self, _failover: bool) -> Result<(), BrokerError> {
        Ok(())
    }
}
