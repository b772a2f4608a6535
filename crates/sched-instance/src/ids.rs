//! Identifiers for instances and tasks.

use std::fmt;

use sched_core::PathId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `instanceId = runSpecId + uuid` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    pub run_spec_id: PathId,
    pub uuid: Uuid,
}

impl InstanceId {
    pub fn new(run_spec_id: PathId) -> Self {
        Self {
            run_spec_id,
            uuid: Uuid::new_v4(),
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.run_spec_id, self.uuid)
    }
}

/// A task id, scoped to its owning instance (`taskId.instanceId` must match
/// the owning instance — spec §3 invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub instance_id: InstanceId,
    pub local_id: String,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.instance_id, self.local_id)
    }
}

/// Where a task or instance is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub host: String,
}
