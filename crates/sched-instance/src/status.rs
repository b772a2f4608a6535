//! `InstanceStatus` and the multi-task aggregation rules from spec §3.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The full set of instance/task lifecycle statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceStatus {
    Created,
    Reserved,
    Staging,
    Starting,
    Running,
    Killing,
    Killed,
    Finished,
    Failed,
    Error,
    Gone,
    Dropped,
    Unreachable,
    Unknown,
}

/// Priority order used when task statuses disagree: the first status from
/// this list present among the tasks wins.
const PRIMARY_PRIORITY: [InstanceStatus; 9] = [
    InstanceStatus::Error,
    InstanceStatus::Failed,
    InstanceStatus::Gone,
    InstanceStatus::Dropped,
    InstanceStatus::Unreachable,
    InstanceStatus::Killing,
    InstanceStatus::Starting,
    InstanceStatus::Staging,
    InstanceStatus::Unknown,
];

/// Fallback priority order, consulted only when no status from
/// `PRIMARY_PRIORITY` is present.
const FALLBACK_PRIORITY: [InstanceStatus; 5] = [
    InstanceStatus::Created,
    InstanceStatus::Reserved,
    InstanceStatus::Running,
    InstanceStatus::Finished,
    InstanceStatus::Killed,
];

impl InstanceStatus {
    /// Whether a task or instance in this status will never transition
    /// again and should be removed from the live set.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InstanceStatus::Finished
                | InstanceStatus::Failed
                | InstanceStatus::Error
                | InstanceStatus::Gone
                | InstanceStatus::Dropped
                | InstanceStatus::Killed
        )
    }

    /// Whether instances in this status are eligible victims for a
    /// scale-down (spec §4.2 kill-ordering policy).
    pub fn is_scale_down_candidate(self) -> bool {
        matches!(
            self,
            InstanceStatus::Staging | InstanceStatus::Starting | InstanceStatus::Running
        )
    }

    /// Whether instances in this status count toward "launched" for the
    /// scale algorithm's `launched` count (spec §4.2).
    pub fn counts_as_launched(self) -> bool {
        matches!(
            self,
            InstanceStatus::Created
                | InstanceStatus::Running
                | InstanceStatus::Staging
                | InstanceStatus::Starting
                | InstanceStatus::Killing
        )
    }
}

/// Compute the aggregate instance status from its tasks' statuses, per the
/// four-step priority rule in spec §3.
pub fn aggregate_status(task_statuses: &[InstanceStatus]) -> InstanceStatus {
    if task_statuses.is_empty() {
        return InstanceStatus::Unknown;
    }
    if task_statuses.iter().all(|s| *s == task_statuses[0]) {
        return task_statuses[0];
    }
    for candidate in PRIMARY_PRIORITY {
        if task_statuses.contains(&candidate) {
            return candidate;
        }
    }
    for candidate in FALLBACK_PRIORITY {
        if task_statuses.contains(&candidate) {
            return candidate;
        }
    }
    warn!(?task_statuses, "no aggregation rule matched task statuses, falling back to Unknown");
    InstanceStatus::Unknown
}

/// Compute the aggregate health: `false` if any task is unhealthy, `true`
/// if every task reports healthy, otherwise unset.
pub fn aggregate_health(task_healths: &[Option<bool>]) -> Option<bool> {
    if task_healths.iter().any(|h| *h == Some(false)) {
        return Some(false);
    }
    if !task_healths.is_empty() && task_healths.iter().all(|h| *h == Some(true)) {
        return Some(true);
    }
    None
}
