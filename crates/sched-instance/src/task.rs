//! `Task` — a single broker-tracked process belonging to an instance.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentInfo, TaskId};
use crate::status::InstanceStatus;

/// The broker's own status report for a task, carried opaquely (spec §6:
/// "serialization is carried in opaque blobs with an externally defined
/// schema"). The core only needs to pass the set of these back to
/// `reconcileTasks`, never to interpret their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrokerTaskStatus(pub String);

/// A single task's mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: InstanceStatus,
    pub launched: bool,
    pub host_ports: Vec<u16>,
    pub agent_info: AgentInfo,
    pub broker_status: Option<BrokerTaskStatus>,
    pub healthy: Option<bool>,
}

/// A task belonging to exactly one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub state: TaskState,
}
