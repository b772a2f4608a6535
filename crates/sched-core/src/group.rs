//! `Group` — a node in the application group tree.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::path_id::PathId;
use crate::run_spec::RunSpec;
use crate::version::VersionInfo;

/// A group: a named collection of apps and subgroups, versioned as a whole.
///
/// Child group and app ids are always descendants of the group's own id
/// (enforced by [`Group::validate`]); dependencies may reference any app or
/// group id reachable from the root, including siblings, but never form a
/// cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: PathId,
    pub apps: BTreeMap<PathId, RunSpec>,
    pub subgroups: BTreeMap<PathId, Group>,
    #[serde(default)]
    pub dependencies: Vec<PathId>,
    pub version: VersionInfo,
}

impl Group {
    pub fn empty_root(version: VersionInfo) -> Self {
        Self {
            id: PathId::root(),
            apps: BTreeMap::new(),
            subgroups: BTreeMap::new(),
            dependencies: Vec::new(),
            version,
        }
    }

    /// All app ids in this group and every descendant subgroup.
    pub fn transitive_app_ids(&self) -> Vec<PathId> {
        let mut ids: Vec<PathId> = self.apps.keys().cloned().collect();
        for sub in self.subgroups.values() {
            ids.extend(sub.transitive_app_ids());
        }
        ids
    }

    /// All run specs in this group and every descendant subgroup.
    pub fn transitive_apps(&self) -> HashMap<PathId, &RunSpec> {
        let mut map = HashMap::new();
        for (id, app) in &self.apps {
            map.insert(id.clone(), app);
        }
        for sub in self.subgroups.values() {
            map.extend(sub.transitive_apps());
        }
        map
    }

    /// Validate structural invariants: child ids are descendants of this
    /// group's id, app ids are unique within the group, subgroup ids are
    /// unique, every individual `RunSpec` validates, and the dependency
    /// graph across all apps and groups is acyclic.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.validate_structure()?;
        for app in self.transitive_apps().values() {
            app.validate()?;
        }
        self.validate_acyclic()
    }

    fn validate_structure(&self) -> Result<(), CoreError> {
        for app_id in self.apps.keys() {
            if !self.id.is_ancestor_of(app_id) {
                return Err(CoreError::validation(
                    app_id.clone(),
                    format!("app id is not a descendant of group {}", self.id),
                ));
            }
        }
        for (sub_id, sub) in &self.subgroups {
            if !self.id.is_strict_ancestor_of(sub_id) {
                return Err(CoreError::validation(
                    sub_id.clone(),
                    format!("subgroup id is not a strict descendant of group {}", self.id),
                ));
            }
            if sub_id != &sub.id {
                return Err(CoreError::validation(
                    sub_id.clone(),
                    "subgroup key does not match its own id",
                ));
            }
            sub.validate_structure()?;
        }
        Ok(())
    }

    /// Build the dependency graph across every app and group reachable from
    /// this group and check it for cycles via depth-first search.
    fn validate_acyclic(&self) -> Result<(), CoreError> {
        let mut edges: HashMap<PathId, Vec<PathId>> = HashMap::new();
        self.collect_edges(&mut edges);

        let mut state: HashMap<PathId, VisitState> = HashMap::new();
        let nodes: Vec<PathId> = edges.keys().cloned().collect();
        for node in nodes {
            if state.get(&node).copied().unwrap_or(VisitState::Unvisited) == VisitState::Unvisited
            {
                Self::dfs(&node, &edges, &mut state)?;
            }
        }
        Ok(())
    }

    fn collect_edges(&self, edges: &mut HashMap<PathId, Vec<PathId>>) {
        for (app_id, app) in &self.apps {
            edges
                .entry(app_id.clone())
                .or_default()
                .extend(app.dependencies.iter().cloned());
        }
        edges
            .entry(self.id.clone())
            .or_default()
            .extend(self.dependencies.iter().cloned());
        for sub in self.subgroups.values() {
            sub.collect_edges(edges);
        }
    }

    fn dfs(
        node: &PathId,
        edges: &HashMap<PathId, Vec<PathId>>,
        state: &mut HashMap<PathId, VisitState>,
    ) -> Result<(), CoreError> {
        state.insert(node.clone(), VisitState::InProgress);
        if let Some(deps) = edges.get(node) {
            for dep in deps {
                match state.get(dep).copied().unwrap_or(VisitState::Unvisited) {
                    VisitState::InProgress => return Err(CoreError::DependencyCycle(dep.clone())),
                    VisitState::Done => continue,
                    VisitState::Unvisited => Self::dfs(dep, edges, state)?,
                }
            }
        }
        state.insert(node.clone(), VisitState::Done);
        Ok(())
    }

    /// The symmetric difference between this group's app ids and `other`'s,
    /// plus the ids whose `RunSpec` content differs between the two —
    /// exactly `affectedRunSpecIds` from spec §3 `DeploymentPlan`.
    pub fn affected_run_spec_ids(&self, other: &Group) -> HashSet<PathId> {
        let self_apps = self.transitive_apps();
        let other_apps = other.transitive_apps();

        let mut affected = HashSet::new();
        for id in self_apps.keys() {
            if !other_apps.contains_key(id) {
                affected.insert(id.clone());
            }
        }
        for id in other_apps.keys() {
            if !self_apps.contains_key(id) {
                affected.insert(id.clone());
            }
        }
        for (id, spec) in &self_apps {
            if let Some(other_spec) = other_apps.get(id) {
                if spec != other_spec {
                    affected.insert(id.clone());
                }
            }
        }
        affected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}
