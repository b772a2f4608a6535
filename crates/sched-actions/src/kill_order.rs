//! Kill-ordering policy for scale-down (spec §4.2 "Kill-ordering policy").

use sched_instance::{Instance, InstanceStatus};

fn bucket(status: InstanceStatus) -> u8 {
    match status {
        InstanceStatus::Staging => 0,
        InstanceStatus::Starting => 1,
        InstanceStatus::Running => 2,
        _ => u8::MAX,
    }
}

/// Order instances for scale-down victim selection: only
/// `Staging`/`Starting`/`Running` instances are candidates; within that,
/// `Staging` before `Starting` before `Running`, and within a bucket the
/// most recently changed (`since` descending) comes first.
pub fn order_victims(instances: &[Instance]) -> Vec<&Instance> {
    let mut candidates: Vec<&Instance> = instances
        .iter()
        .filter(|i| i.state.status.is_scale_down_candidate())
        .collect();
    candidates.sort_by(|a, b| {
        bucket(a.state.status)
            .cmp(&bucket(b.state.status))
            .then_with(|| b.state.since.cmp(&a.state.since))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{PathId, Timestamp};
    use sched_instance::{AgentInfo, InstanceId, InstanceState, Task, TaskId, TaskState};
    use std::collections::BTreeMap;

    fn instance(status: InstanceStatus, since_secs: i64) -> Instance {
        let instance_id = InstanceId::new(PathId::parse("/app").unwrap());
        let since = Timestamp::from_datetime(
            chrono::DateTime::from_timestamp(since_secs, 0).unwrap(),
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
    fn staging_precedes_starting_precedes_running() {
        let instances = vec![
            instance(InstanceStatus::Running, 1),
            instance(InstanceStatus::Starting, 1),
            instance(InstanceStatus::Staging, 1),
        ];
        let ordered = order_victims(&instances);
        assert_eq!(ordered[0].state.status, InstanceStatus::Staging);
        assert_eq!(ordered[1].state.status, InstanceStatus::Starting);
        assert_eq!(ordered[2].state.status, InstanceStatus::Running);
    }

    #[test]
    fn within_bucket_newest_since_first() {
        let instances = vec![
            instance(InstanceStatus::Running, 1),
            instance(InstanceStatus::Running, 4),
            instance(InstanceStatus::Running, 2),
        ];
        let ordered = order_victims(&instances);
        assert_eq!(ordered[0].state.since, Timestamp::from_datetime(chrono::DateTime::from_timestamp(4, 0).unwrap()));
    }

    #[test]
    fn non_candidate_statuses_excluded() {
        let instances = vec![instance(InstanceStatus::Finished, 1), instance(InstanceStatus::Killed, 2)];
        assert!(order_victims(&instances).is_empty());
    }

    #[test]
    fn spec_scenario_four() {
        // instances=3, 3 Running at since=1,2,3, 1 Staged at since=1, 1 Running at since=4.
        // Expect victims [staged_1, running_4].
        let instances = vec![
            instance(InstanceStatus::Running, 1),
            instance(InstanceStatus::Running, 2),
            instance(InstanceStatus::Running, 3),
            instance(InstanceStatus::Staging, 1),
            instance(InstanceStatus::Running, 4),
        ];
        let ordered = order_victims(&instances);
        let victims: Vec<_> = ordered.into_iter().take(2).collect();
        assert_eq!(victims[0].state.status, InstanceStatus::Staging);
        assert_eq!(victims[1].state.status, InstanceStatus::Running);
        assert_eq!(victims[1].state.since, Timestamp::from_datetime(chrono::DateTime::from_timestamp(4, 0).unwrap()));
    }
}
