//! The pure scale algorithm (spec §4.2 "Scale algorithm").

use sched_broker::QueuedInstanceInfo;
use sched_core::RunSpec;
use sched_instance::{Instance, InstanceId, InstanceStatus};

use crate::kill_order::order_victims;

/// What the scale algorithm decided to do, given a `RunSpec` and a snapshot
/// of its current instances and launch-queue state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Enqueue `count` additional launches.
    ScaleUp { count: u32 },
    /// Purge the launch queue for this run spec, then kill these instances
    /// (in victim order, youngest-eligible-first) with reason `ScalingApp`.
    ScaleDown { victims: Vec<InstanceId> },
    /// `target == launched`; nothing to do.
    Equal,
}

/// How many instances currently count as launched, per spec §4.2:
/// `Created, Running, Staging, Starting, Killing`.
pub fn launched_count(instances: &[Instance]) -> u32 {
    instances
        .iter()
        .filter(|i| i.state.status.counts_as_launched())
        .count() as u32
}

/// Compute the scale decision for `run_spec` given its current instances and
/// optional launch-queue entry.
///
/// This function performs no I/O and makes no assumption about staleness:
/// callers may call it against a point-in-time snapshot (spec §5).
pub fn scale(
    run_spec: &RunSpec,
    instances: &[Instance],
    queue_entry: Option<&QueuedInstanceInfo>,
) -> ScaleDecision {
    let launched = launched_count(instances);
    let target = run_spec.instances;

    match target.cmp(&launched) {
        std::cmp::Ordering::Greater => {
            let queued_or_running = queue_entry.map(|q| q.queued_or_running()).unwrap_or(launched);
            let to_queue = target.saturating_sub(queued_or_running);
            if to_queue == 0 {
                ScaleDecision::Equal
            } else {
                ScaleDecision::ScaleUp { count: to_queue }
            }
        }
        std::cmp::Ordering::Less => {
            let excess = launched - target;
            let victims = order_victims(instances)
                .into_iter()
                .take(excess as usize)
                .map(|i| i.instance_id.clone())
                .collect();
            ScaleDecision::ScaleDown { victims }
        }
        std::cmp::Ordering::Equal => ScaleDecision::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{NetworkMode, PathId, ResourceLimits, Timestamp, UpgradeStrategy, VersionInfo};
    use sched_instance::{AgentInfo, InstanceState, Task, TaskId, TaskState};
    use std::collections::BTreeMap;

    fn run_spec(instances: u32) -> RunSpec {
        RunSpec {
            id: PathId::parse("/app").unwrap(),
            command: "run".into(),
            args: vec![],
            resources: ResourceLimits { cpu_shares: 1.0, mem_bytes: 1, disk_bytes: 0, gpu: 0 },
            instances,
            network: NetworkMode::IpPerTask,
            health_checks: vec![],
            upgrade_strategy: UpgradeStrategy::default(),
            dependencies: vec![],
            residency: None,
            secrets: BTreeMap::new(),
            version_info: VersionInfo::fresh_at(Timestamp::now()),
        }
    }

    fn instance_with(status: InstanceStatus, since_offset_secs: i64) -> Instance {
        let instance_id = InstanceId::new(PathId::parse("/app").unwrap());
        let since = Timestamp::from_datetime(
            chrono::Utc::now() + chrono::Duration::seconds(since_offset_secs),
        );
        let mut tasks = BTreeMap::new();
        tasks.insert(
            "t1".to_string(),
            Task {
                id: TaskId { instance_id: instance_id.clone(), local_id: "t1".into() },
                state: TaskState {
                    status,
                    launched: true,
                    host_ports: vec![],
                    agent_info: AgentInfo { agent_id: "a".into(), host: "h".into() },
                    broker_status: None,
                    healthy: None,
                },
            },
        );
        Instance {
            instance_id,
            agent_info: AgentInfo { agent_id: "a".into(), host: "h".into() },
            state: InstanceState { status, since, version: since, healthy: None },
            tasks,
        }
    }

    #[test]
    fn equal_is_noop() {
        let spec = run_spec(2);
        let instances = vec![
            instance_with(InstanceStatus::Running, 0),
            instance_with(InstanceStatus::Running, 0),
        ];
        assert_eq!(scale(&spec, &instances, None), ScaleDecision::Equal);
    }

    #[test]
    fn scale_up_uses_launched_count_without_queue() {
        let spec = run_spec(3);
        let instances = vec![instance_with(InstanceStatus::Running, 0)];
        assert_eq!(scale(&spec, &instances, None), ScaleDecision::ScaleUp { count: 2 });
    }

    #[test]
    fn scale_up_replaces_unreachable_per_queue() {
        let spec = run_spec(15);
        let instances: Vec<Instance> = (0..10).map(|_| instance_with(InstanceStatus::Running, 0)).collect();
        let queue = QueuedInstanceInfo {
            run_spec_id: PathId::parse("/app").unwrap(),
            instances_left_to_launch: 0,
            in_progress: true,
            final_instance_count: 15,
            unreachable_instances: 5,
        };
        assert_eq!(scale(&spec, &instances, Some(&queue)), ScaleDecision::ScaleUp { count: 5 });
    }

    #[test]
    fn scale_down_kills_youngest_staged_then_running() {
        let spec = run_spec(3);
        let mut instances = vec![
            instance_with(InstanceStatus::Running, -3),
            instance_with(InstanceStatus::Running, -2),
            instance_with(InstanceStatus::Running, -1),
            instance_with(InstanceStatus::Staging, -3),
            instance_with(InstanceStatus::Running, 0),
        ];
        let decision = scale(&spec, &instances, None);
        match decision {
            ScaleDecision::ScaleDown { victims } => assert_eq!(victims.len(), 2),
            other => panic!("expected ScaleDown, got {other:?}"),
        }
        instances.clear();
    }
}
