//! `StopApp` (spec §4.2).

use std::sync::Arc;

use sched_broker::{EventBus, KillReason, KillService, LaunchQueue, SchedulerEvent};
use sched_core::PathId;
use sched_health::HealthCheckManager;
use sched_instance::InstanceTracker;
use tracing::info;

use crate::error::ActionsError;
use crate::scale::launched_count;

/// Remove all health checks for `app_id`; kill every currently-launched
/// instance with reason `DeletingApp`; purge the launch queue and reset its
/// rate-limit delay; publish `AppTerminated`.
///
/// Instance rows themselves are removed only upon broker-confirmed terminal
/// status, never here — this function only requests the kills.
pub async fn stop_app(
    app_id: &PathId,
    tracker: &InstanceTracker,
    health: &HealthCheckManager,
    kill_service: &Arc<dyn KillService>,
    launch_queue: &Arc<dyn LaunchQueue>,
    events: &EventBus,
) -> Result<(), ActionsError> {
    health.remove_all_for(app_id).await;

    let instances = tracker.spec_instances(app_id).await;
    if launched_count(&instances) > 0 {
        let ids: Vec<_> = instances
            .iter()
            .filter(|i| i.state.status.counts_as_launched())
            .map(|i| i.instance_id.clone())
            .collect();
        kill_service.kill_instances(app_id, &ids, KillReason::DeletingApp).await?;
    }

    launch_queue.purge(app_id).await?;
    launch_queue.reset_delay(app_id).await?;

    events.publish(SchedulerEvent::AppTerminated { app_id: app_id.clone() });
    info!(%app_id, "app stopped");
    Ok(())
}
