//! `Instance` — a scheduled unit comprising one or more tasks.

use std::collections::BTreeMap;

use sched_core::{PathId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentInfo, InstanceId};
use crate::status::{aggregate_health, aggregate_status, InstanceStatus};
use crate::task::Task;

/// The instance's aggregate state, recomputed from its tasks on every
/// update (spec §3). When aggregate status and health are unchanged across
/// a recompute, the prior `InstanceState` — including `since` — is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub status: InstanceStatus,
    pub since: Timestamp,
    pub version: Timestamp,
    pub healthy: Option<bool>,
}

/// A scheduled unit: one or more tasks sharing lifecycle and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub agent_info: AgentInfo,
    pub state: InstanceState,
    pub tasks: BTreeMap<String, Task>,
}

impl Instance {
    pub fn run_spec_id(&self) -> &PathId {
        &self.instance_id.run_spec_id
    }

    /// `isLaunched ⇔ all tasks launched` (spec §3); an instance with no
    /// tasks is not launched.
    pub fn is_launched(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.values().all(|t| t.state.launched)
    }

    /// Recompute `state` from the current task set. If the recomputed
    /// status and health match the prior state, the prior `InstanceState`
    /// (and its `since`) is kept unchanged; otherwise `since` is set to
    /// `now`.
    pub fn recompute_aggregate(&mut self, now: Timestamp) {
        let statuses: Vec<InstanceStatus> = self.tasks.values().map(|t| t.state.status).collect();
        let healths: Vec<Option<bool>> = self.tasks.values().map(|t| t.state.healthy).collect();

        let status = aggregate_status(&statuses);
        let healthy = aggregate_health(&healths);

        if status == self.state.status && healthy == self.state.healthy {
            return;
        }
        self.state = InstanceState {
            status,
            since: now,
            version: self.state.version,
            healthy,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TaskId;
    use crate::task::TaskState;

    fn task(local_id: &str, status: InstanceStatus, healthy: Option<bool>) -> Task {
        Task {
            id: TaskId {
                instance_id: InstanceId::new(PathId::parse("/app").unwrap()),
                local_id: local_id.into(),
            },
            state: TaskState {
                status,
                launched: true,
                host_ports: vec![],
                agent_info: AgentInfo {
                    agent_id: "agent-1".into(),
                    host: "host-1".into(),
                },
                broker_status: None,
                healthy,
            },
        }
    }

    fn base_instance(t0: Timestamp) -> Instance {
        Instance {
            instance_id: InstanceId::new(PathId::parse("/app").unwrap()),
            agent_info: AgentInfo {
                agent_id: "agent-1".into(),
                host: "host-1".into(),
            },
            state: InstanceState {
                status: InstanceStatus::Staging,
                since: t0,
                version: t0,
                healthy: None,
            },
            tasks: BTreeMap::new(),
        }
    }

    #[test]
    fn recompute_preserves_since_when_unchanged() {
        let t0 = Timestamp::now();
        let mut instance = base_instance(t0);
        instance
            .tasks
            .insert("t1".into(), task("t1", InstanceStatus::Staging, None));
        let t1 = Timestamp::from_datetime(t0.as_datetime() + chrono::Duration::seconds(1));
        instance.recompute_aggregate(t1);
        assert_eq!(instance.state.status, InstanceStatus::Staging);
        assert_eq!(instance.state.since, t0);
    }

    #[test]
    fn recompute_advances_since_when_status_changes() {
        let t0 = Timestamp::now();
        let mut instance = base_instance(t0);
        instance
            .tasks
            .insert("t1".into(), task("t1", InstanceStatus::Running, Some(true)));
        let t1 = Timestamp::from_datetime(t0.as_datetime() + chrono::Duration::seconds(1));
        instance.recompute_aggregate(t1);
        assert_eq!(instance.state.status, InstanceStatus::Running);
        assert_eq!(instance.state.since, t1);
        assert_eq!(instance.state.healthy, Some(true));
    }

    #[test]
    fn is_launched_requires_all_tasks_launched() {
        let t0 = Timestamp::now();
        let mut instance = base_instance(t0);
        assert!(!instance.is_launched());
        instance
            .tasks
            .insert("t1".into(), task("t1", InstanceStatus::Running, Some(true)));
        assert!(instance.is_launched());
        let mut unlaunched = task("t2", InstanceStatus::Staging, None);
        unlaunched.state.launched = false;
        instance.tasks.insert("t2".into(), unlaunched);
        assert!(!instance.is_launched());
    }
}
