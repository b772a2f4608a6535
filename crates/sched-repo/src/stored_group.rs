//! The on-disk shape of a group: app references by `(id, version)` rather
//! than inline `RunSpec`s, matching spec §4.5's "Group resolution".

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use sched_core::{Group, PathId, RunSpec, Timestamp, VersionInfo};
use sched_store::{EntityKind, PersistentStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RepoError, RepoResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredGroup {
    pub id: PathId,
    pub app_refs: BTreeMap<PathId, Timestamp>,
    pub subgroups: BTreeMap<PathId, StoredGroup>,
    pub dependencies: Vec<PathId>,
    pub version: VersionInfo,
}

impl StoredGroup {
    /// Project a resolved [`Group`] into its storable reference form.
    ///
    /// Every app's version is taken from its own `version_info.last_scaling_change`,
    /// which advances on both config and scale-only changes (see
    /// [`sched_core::VersionInfo`]) and so always identifies the exact app
    /// revision this group snapshot refers to.
    pub fn from_group(group: &Group) -> Self {
        Self {
            id: group.id.clone(),
            app_refs: group
                .apps
                .iter()
                .map(|(id, app)| (id.clone(), app.version_info.last_scaling_change))
                .collect(),
            subgroups: group
                .subgroups
                .iter()
                .map(|(id, sub)| (id.clone(), StoredGroup::from_group(sub)))
                .collect(),
            dependencies: group.dependencies.clone(),
            version: group.version,
        }
    }

    /// Concurrently resolve every referenced app version into a full
    /// [`Group`]. Apps that fail to load are omitted with a warning rather
    /// than failing the whole resolution, per spec §4.5.
    pub async fn resolve(&self, store: &Arc<dyn PersistentStore>) -> RepoResult<Group> {
        let fetches = self.app_refs.iter().map(|(app_id, version)| {
            let store = store.clone();
            let app_id = app_id.clone();
            let version = *version;
            async move {
                match store.get_version(EntityKind::App, &app_id, version) {
                    Ok(Some(blob)) => match serde_json::from_slice::<RunSpec>(&blob) {
                        Ok(spec) => Some((app_id, spec)),
                        Err(err) => {
                            warn!(%app_id, %err, "app revision failed to deserialize, omitting");
                            None
                        }
                    },
                    Ok(None) => {
                        warn!(%app_id, %version, "referenced app revision missing, omitting");
                        None
                    }
                    Err(err) => {
                        warn!(%app_id, %err, "app revision failed to load, omitting");
                        None
                    }
                }
            }
        });
        let apps = join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect::<BTreeMap<_, _>>();

        let mut subgroups = BTreeMap::new();
        for (sub_id, sub) in &self.subgroups {
            subgroups.insert(sub_id.clone(), Box::pin(sub.resolve(store)).await?);
        }

        Ok(Group {
            id: self.id.clone(),
            apps,
            subgroups,
            dependencies: self.dependencies.clone(),
            version: self.version,
        })
    }

    pub fn to_blob(&self) -> RepoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RepoError::Corrupt {
            path: self.id.clone(),
            source: Arc::new(e),
        })
    }

    pub fn from_blob(id: &PathId, blob: &[u8]) -> RepoResult<Self> {
        serde_json::from_slice(blob).map_err(|e| RepoError::Corrupt {
            path: id.clone(),
            source: Arc::new(e),
        })
    }
}
