//! `DeploymentPlan` — an ordered list of steps transforming one group
//! version into another (spec §3, §4.3).

use std::collections::HashSet;

use sched_broker::DeploymentId;
use sched_core::{Group, PathId, Timestamp};
use serde::{Deserialize, Serialize};

/// The action to perform for one app within a deployment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// Bring the app up to its target instance count for the first time.
    Start,
    /// Scale every instance of the app to zero and leave it defined.
    Stop,
    /// Scale the app to its (possibly unchanged) target instance count.
    Scale,
    /// Stop, then start — used for apps whose `RunSpec` content changed.
    Restart,
}

/// One step of a deployment plan: act on a single app and wait for it to
/// settle before the worker advances to the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    pub app_id: PathId,
    pub action: StepAction,
}

/// An ordered list of steps transforming `original` into `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub id: DeploymentId,
    pub original: Group,
    pub target: Group,
    pub steps: Vec<DeploymentStep>,
    pub created_at: Timestamp,
    pub affected_run_spec_ids: HashSet<PathId>,
}

impl DeploymentPlan {
    /// Build a plan from `original` to `target`.
    ///
    /// Steps are ordered: removed apps first (`Stop`), then apps present in
    /// both groups whose definition changed (`Restart`) or is unchanged but
    /// whose instance count differs (`Scale`), then newly added apps
    /// (`Start`). Within each bucket, apps are ordered by id for
    /// determinism; the spec does not require ordering apps by their
    /// declared dependency graph within a single plan (only that a single
    /// deployment's own steps run in declared order, per spec §5).
    pub fn build(original: &Group, target: &Group, created_at: Timestamp) -> Self {
        let affected_run_spec_ids = original.affected_run_spec_ids(target);
        let original_apps = original.transitive_apps();
        let target_apps = target.transitive_apps();

        let mut removed: Vec<PathId> = Vec::new();
        let mut changed: Vec<PathId> = Vec::new();
        let mut rescaled: Vec<PathId> = Vec::new();
        let mut added: Vec<PathId> = Vec::new();

        for id in &affected_run_spec_ids {
            match (original_apps.get(id), target_apps.get(id)) {
                (Some(_), None) => removed.push(id.clone()),
                (None, Some(_)) => added.push(id.clone()),
                (Some(old), Some(new)) => {
                    if old.command != new.command
                        || old.args != new.args
                        || old.resources != new.resources
                        || old.network != new.network
                        || old.health_checks != new.health_checks
                    {
                        changed.push(id.clone());
                    } else {
                        rescaled.push(id.clone());
                    }
                }
                (None, None) => unreachable!("affected id present in neither group"),
            }
        }
        removed.sort();
        changed.sort();
        rescaled.sort();
        added.sort();

        let mut steps = Vec::new();
        steps.extend(removed.into_iter().map(|app_id| DeploymentStep { app_id, action: StepAction::Stop }));
        steps.extend(changed.into_iter().map(|app_id| DeploymentStep { app_id, action: StepAction::Restart }));
        steps.extend(rescaled.into_iter().map(|app_id| DeploymentStep { app_id, action: StepAction::Scale }));
        steps.extend(added.into_iter().map(|app_id| DeploymentStep { app_id, action: StepAction::Start }));

        Self {
            id: DeploymentId::new(),
            original: original.clone(),
            target: target.clone(),
            steps,
            created_at,
            affected_run_spec_ids,
        }
    }
}
