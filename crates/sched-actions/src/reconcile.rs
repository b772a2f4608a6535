//! Broker-side task reconciliation and orphan detection (spec §4.2).

use std::collections::HashSet;
use std::sync::Arc;

use sched_broker::{BrokerDriver, KillReason, KillService};
use sched_instance::{BrokerTaskStatus, InstanceTracker};
use sched_repo::GroupRepository;
use tracing::{info, warn};

use crate::error::ActionsError;

/// Run one reconciliation pass:
///
/// 1. Read the known app ids from the repository and the full instance
///    snapshot from the tracker.
/// 2. Collect every task's broker-reported status for tasks belonging to a
///    known app.
/// 3. Kill every instance of an app present in the tracker but absent from
///    the repository, with reason `Orphaned`.
/// 4. Ask the driver to reconcile the known statuses, then always issue the
///    implicit reconcile (empty set) asking about anything else the broker
///    knows about.
pub async fn reconcile_tasks(
    repo: &GroupRepository,
    tracker: &InstanceTracker,
    driver: &dyn BrokerDriver,
    kill_service: &Arc<dyn KillService>,
) -> Result<(), ActionsError> {
    let known_app_ids: HashSet<_> = repo.ids()?.into_iter().collect();
    let instances = tracker.snapshot().await;
    let tracker_spec_ids = tracker.known_spec_ids_sync();

    let known_task_statuses: HashSet<BrokerTaskStatus> = instances
        .iter()
        .filter(|i| known_app_ids.contains(i.run_spec_id()))
        .flat_map(|i| i.tasks.values())
        .filter_map(|t| t.state.broker_status.clone())
        .collect();

    for orphan_id in tracker_spec_ids.difference(&known_app_ids) {
        let orphan_instances: Vec<_> = instances
            .iter()
            .filter(|i| i.run_spec_id() == orphan_id)
            .map(|i| i.instance_id.clone())
            .collect();
        if orphan_instances.is_empty() {
            continue;
        }
        warn!(app_id = %orphan_id, count = orphan_instances.len(), "killing orphaned instances");
        kill_service
            .kill_instances(orphan_id, &orphan_instances, KillReason::Orphaned)
            .await?;
    }

    if !known_task_statuses.is_empty() {
        driver.reconcile_tasks(known_task_statuses).await?;
    }
    driver.reconcile_tasks(HashSet::new()).await?;

    info!("reconciliation pass complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sched_broker::BrokerError;
    use sched_core::PathId;
    use sched_instance::{
        AgentInfo, Instance, InstanceId, InstanceState, InstanceStatus, InstanceUpdateOperation,
        Task, TaskId, TaskState,
    };
    use sched_core::Timestamp;
    use sched_store::RedbStore;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingDriver {
        calls: StdMutex<Vec<HashSet<BrokerTaskStatus>>>,
    }

    #[async_trait]
    impl BrokerDriver for RecordingDriver {
        async fn reconcile_tasks(&self, statuses: HashSet<BrokerTaskStatus>) -> Result<(), BrokerError> {
            self.calls.lock().unwrap().push(statuses);
            Ok(())
        }
        async fn acknowledge_status_update(&self, _status: &BrokerTaskStatus) -> Result<(), BrokerError> {
            Ok(())
        }
        async fn stop(&self, _failover: bool) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    struct RecordingKillService {
        kills: AtomicUsize,
    }

    #[async_trait]
    impl KillService for RecordingKillService {
        async fn kill_instances(
            &self,
            _app_id: &PathId,
            instance_ids: &[InstanceId],
            _reason: KillReason,
        ) -> Result<(), BrokerError> {
            self.kills.fetch_add(instance_ids.len(), Ordering::SeqCst);
            Ok(())
        }
        async fn kill_task(&self, _task_id: &TaskId, _reason: KillReason) -> Result<(), BrokerError> {
            Ok(())
        }
    }

    fn instance(run_spec: &str, broker_status: Option<&str>) -> Instance {
        let instance_id = InstanceId::new(PathId::parse(run_spec).unwrap());
        let mut tasks = BTreeMap::new();
        tasks.insert(
            "t1".to_string(),
            Task {
                id: TaskId { instance_id: instance_id.clone(), local_id: "t1".into() },
                state: TaskState {
                    status: InstanceStatus::Running,
                    launched: true,
                    host_ports: vec![],
                    agent_info: AgentInfo { agent_id: "a".into(), host: "h".into() },
                    broker_status: broker_status.map(|s| BrokerTaskStatus(s.to_string())),
                    healthy: None,
                },
            },
        );
        Instance {
            instance_id,
            agent_info: AgentInfo { agent_id: "a".into(), host: "h".into() },
            state: InstanceState {
                status: InstanceStatus::Running,
                since: Timestamp::now(),
                version: Timestamp::now(),
                healthy: None,
            },
            tasks,
        }
    }

    #[tokio::test]
    async fn mixed_known_and_orphan_reconciles_and_kills_orphan() {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        let repo = GroupRepository::new(store);
        let tracker = InstanceTracker::new();

        let known = instance("/app", Some("status-1"));
        tracker.apply(&known.instance_id.clone(), InstanceUpdateOperation::LaunchEphemeral(known), Timestamp::now());
        let orphan = instance("/orphan", None);
        let orphan_id = orphan.instance_id.clone();
        tracker.apply(&orphan_id, InstanceUpdateOperation::LaunchEphemeral(orphan), Timestamp::now());

        // `/app` is registered with the repo (store a run spec under it) so
        // it is not considered an orphan; `/orphan` never is.
        let app_spec = super::tests_support::minimal_run_spec("/app");
        repo.store(&app_spec).unwrap();

        let driver = RecordingDriver { calls: StdMutex::new(vec![]) };
        let kill_service: Arc<dyn KillService> = Arc::new(RecordingKillService { kills: AtomicUsize::new(0) });

        reconcile_tasks(&repo, &tracker, &driver, &kill_service).await.unwrap();

        let calls = driver.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].is_empty());
    }
}

#[cfg(test)]
mod tests_support {
    use sched_core::{NetworkMode, PathId, ResourceLimits, RunSpec, Timestamp, UpgradeStrategy, VersionInfo};
    use std::collections::BTreeMap;

    pub fn minimal_run_spec(id: &str) -> RunSpec {
        RunSpec {
            id: PathId::parse(id).unwrap(),
            command: "run".into(),
            args: vec![],
            resources: ResourceLimits { cpu_shares: 1.0, mem_bytes: 1, disk_bytes: 0, gpu: 0 },
            instances: 1,
            network: NetworkMode::IpPerTask,
            health_checks: vec![],
            upgrade_strategy: UpgradeStrategy::default(),
            dependencies: vec![],
            residency: None,
            secrets: BTreeMap::new(),
            version_info: VersionInfo::fresh_at(Timestamp::now()),
        }
    }
}
