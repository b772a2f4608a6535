//! The pure instance state machine (spec §4.4).
//!
//! `apply_operation` takes the current instance (if any) and an
//! [`InstanceUpdateOperation`], and produces an [`InstanceUpdateEffect`]
//! without touching any shared state — [`crate::tracker::InstanceTracker`]
//! is the only thing that actually commits effects.

use sched_core::Timestamp;

use crate::error::InstanceError;
use crate::ids::TaskId;
use crate::instance::Instance;
use crate::status::InstanceStatus;
use crate::task::BrokerTaskStatus;

/// An operation to apply to an instance (or to create one).
#[derive(Debug, Clone)]
pub enum InstanceUpdateOperation {
    /// Create a brand-new instance from a launch-queue match.
    LaunchEphemeral(Instance),
    /// A broker task-status update.
    MesosUpdate {
        task_id: TaskId,
        status: InstanceStatus,
        broker_status: BrokerTaskStatus,
        host_ports: Option<Vec<u16>>,
        healthy: Option<bool>,
    },
    /// A reservation has been fulfilled and the instance can now launch.
    LaunchOnReservation(Instance),
    /// Reserve a resident slot, creating a new `Reserved` instance.
    Reserve(Instance),
    /// A reservation expired before it was claimed.
    ReservationTimeout,
    /// Unconditionally remove the instance.
    ForceExpunge,
    /// Revert a reservation (unsupported; always fails).
    Revert,
}

/// The result of applying an [`InstanceUpdateOperation`].
#[derive(Debug, Clone)]
pub enum InstanceUpdateEffect {
    /// The instance was created or changed. `old` is `None` only on first
    /// creation.
    Update { new: Instance, old: Option<Instance> },
    /// The operation was legal but produced no observable change.
    Noop(crate::ids::InstanceId),
    /// The instance should be removed entirely.
    Expunge(Instance),
    /// The operation was illegal given the current state.
    Failure(InstanceError),
}

/// Apply `op` against `current` (the tracker's present view of the
/// instance, or `None` if it doesn't exist), returning the effect to
/// commit. `now` stamps any resulting aggregate-state transition.
pub fn apply_operation(
    current: Option<&Instance>,
    op: InstanceUpdateOperation,
    now: Timestamp,
) -> InstanceUpdateEffect {
    match op {
        InstanceUpdateOperation::LaunchEphemeral(instance) => match current {
            Some(_) => InstanceUpdateEffect::Failure(InstanceError::AlreadyExists(instance.instance_id)),
            None => InstanceUpdateEffect::Update { new: instance, old: None },
        },

        InstanceUpdateOperation::Reserve(instance) => match current {
            Some(_) => InstanceUpdateEffect::Failure(InstanceError::AlreadyExists(instance.instance_id)),
            None => InstanceUpdateEffect::Update { new: instance, old: None },
        },

        InstanceUpdateOperation::Revert => {
            InstanceUpdateEffect::Failure(InstanceError::Unsupported("Revert"))
        }

        InstanceUpdateOperation::LaunchOnReservation(instance) => match current {
            Some(existing) if existing.state.status == InstanceStatus::Reserved => {
                InstanceUpdateEffect::Update {
                    new: instance,
                    old: Some(existing.clone()),
                }
            }
            _ => InstanceUpdateEffect::Failure(InstanceError::NotReserved),
        },

        InstanceUpdateOperation::ReservationTimeout => match current {
            Some(existing) if existing.state.status == InstanceStatus::Reserved => {
                InstanceUpdateEffect::Expunge(existing.clone())
            }
            _ => InstanceUpdateEffect::Failure(InstanceError::NotReserved),
        },

        InstanceUpdateOperation::ForceExpunge => match current {
            Some(existing) => InstanceUpdateEffect::Expunge(existing.clone()),
            None => InstanceUpdateEffect::Failure(InstanceError::Unsupported(
                "ForceExpunge on an instance the tracker does not know",
            )),
        },

        InstanceUpdateOperation::MesosUpdate {
            task_id,
            status,
            broker_status,
            host_ports,
            healthy,
        } => apply_mesos_update(current, task_id, status, broker_status, host_ports, healthy, now),
    }
}

fn apply_mesos_update(
    current: Option<&Instance>,
    task_id: TaskId,
    status: InstanceStatus,
    broker_status: BrokerTaskStatus,
    host_ports: Option<Vec<u16>>,
    healthy: Option<bool>,
    now: Timestamp,
) -> InstanceUpdateEffect {
    let Some(existing) = current else {
        return InstanceUpdateEffect::Failure(InstanceError::UnknownInstance(task_id.instance_id));
    };
    if !existing.tasks.contains_key(&task_id.local_id) {
        return InstanceUpdateEffect::Failure(InstanceError::UnknownTask(task_id));
    }

    let mut updated = existing.clone();
    let prior_task_status;
    {
        let task = updated
            .tasks
            .get_mut(&task_id.local_id)
            .expect("checked above");
        prior_task_status = task.state.status;
        task.state.status = status;
        task.state.broker_status = Some(broker_status);
        task.state.launched = true;
        task.state.healthy = healthy;
        if let Some(ports) = host_ports {
            task.state.host_ports = ports;
        }
    }

    if status.is_terminal() {
        updated.tasks.remove(&task_id.local_id);
    }

    if updated.tasks.is_empty() {
        return InstanceUpdateEffect::Expunge(updated);
    }

    let prior_state = existing.state.clone();
    updated.recompute_aggregate(now);

    if updated.state == prior_state && prior_task_status == status {
        InstanceUpdateEffect::Noop(existing.instance_id.clone())
    } else {
        InstanceUpdateEffect::Update {
            new: updated,
            old: Some(existing.clone()),
        }
    }
}
