//! `ReconcileHealthChecks` (spec §4.6) — register checks for every live
//! instance's `runSpecVersion` and drop checks for versions with no live
//! instances left, across every app in the repository.

use sched_broker::EventBus;
use sched_health::HealthCheckManager;
use sched_instance::InstanceTracker;
use sched_repo::GroupRepository;
use tracing::warn;

use crate::error::ActionsError;

/// Run one health-check reconciliation pass over every app the repository
/// knows about. Apps with no tracked instances still reconcile — this is
/// how a scaled-to-zero or newly-deleted app's stale checks get dropped.
pub async fn reconcile_health_checks(
    repo: &GroupRepository,
    tracker: &InstanceTracker,
    health: &HealthCheckManager,
    events: &EventBus,
) -> Result<(), ActionsError> {
    for app_id in repo.ids()? {
        let Some(run_spec) = repo.get(&app_id)? else {
            warn!(%app_id, "app id listed by repository but no current run spec found");
            continue;
        };
        let live = tracker.spec_instances(&app_id).await;
        health.reconcile_with(&app_id, &live, &run_spec.health_checks, events).await;
    }
    Ok(())
}
