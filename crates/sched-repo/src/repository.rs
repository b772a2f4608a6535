//! `GroupRepository` — the read/write-through cache described in spec §4.5.
//!
//! The cache invariant is carried by a single `rootFuture` cell: a
//! [`Shared`] future that either resolves to the current root [`Group`] or
//! is still in flight. Readers clone and await the shared future (cheap,
//! and naturally coalesces concurrent loads into one fetch); writers swap
//! in a fresh, initially-uncompleted promise before doing any I/O so that
//! readers racing a `store_root` wait for *that* write rather than seeing a
//! stale group.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::{FutureExt, Shared};
use sched_core::{Group, PathId, RunSpec, Timestamp};
use sched_store::{EntityKind, PersistentStore};
use tokio::sync::{oneshot, Mutex};
use tracing::warn;

use crate::error::{RepoError, RepoResult};
use crate::stored_group::StoredGroup;

type RootResult = Result<Arc<Group>, Arc<RepoError>>;
type RootFuture = Shared<Pin<Box<dyn Future<Output = RootResult> + Send>>>;

/// A hook invoked before `store_root` persists anything; returning an error
/// aborts the write with no side effects.
pub type PreStoreHook = Arc<dyn Fn(&Group) -> RepoResult<()> + Send + Sync>;

pub struct GroupRepository {
    store: Arc<dyn PersistentStore>,
    root_future: Mutex<RootFuture>,
    pre_store_hook: Option<PreStoreHook>,
}

impl GroupRepository {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        let initial = Self::load_future(store.clone());
        Self {
            store,
            root_future: Mutex::new(initial),
            pre_store_hook: None,
        }
    }

    pub fn with_pre_store_hook(mut self, hook: PreStoreHook) -> Self {
        self.pre_store_hook = Some(hook);
        self
    }

    /// Build a future that fetches and resolves the root group from the
    /// underlying store exactly once.
    fn load_future(store: Arc<dyn PersistentStore>) -> RootFuture {
        let fut: Pin<Box<dyn Future<Output = RootResult> + Send>> = Box::pin(async move {
            Self::fetch_root(&store)
                .await
                .map(Arc::new)
                .map_err(Arc::new)
        });
        fut.shared()
    }

    async fn fetch_root(store: &Arc<dyn PersistentStore>) -> RepoResult<Group> {
        let root_id = PathId::root();
        match store.get(EntityKind::Group, &root_id)? {
            Some((version, blob)) => {
                let stored = StoredGroup::from_blob(&root_id, &blob)?;
                debug_assert_eq!(stored.version.last_scaling_change, version);
                stored.resolve(store).await
            }
            None => Ok(Group::empty_root(sched_core::VersionInfo::fresh_at(
                Timestamp::now(),
            ))),
        }
    }

    /// Build a oneshot-backed promise: a `RootFuture` that stays pending
    /// until `complete_pending` is called with its sender.
    fn pending_future() -> (oneshot::Sender<RootResult>, RootFuture) {
        let (tx, rx) = oneshot::channel::<RootResult>();
        let fut: Pin<Box<dyn Future<Output = RootResult> + Send>> = Box::pin(async move {
            rx.await.unwrap_or_else(|_| Err(Arc::new(RepoError::Cancelled)))
        });
        (tx, fut.shared())
    }

    /// Return the current root group, loading it if this is the first
    /// access or the previous load failed.
    pub async fn root(&self) -> RepoResult<Arc<Group>> {
        let current = { self.root_future.lock().await.clone() };
        match current.await {
            Ok(group) => Ok(group),
            Err(_) => {
                let fresh = Self::load_future(self.store.clone());
                {
                    let mut guard = self.root_future.lock().await;
                    *guard = fresh.clone();
                }
                fresh.await.map_err(|e| (*e).clone())
            }
        }
    }

    /// The root group as of `ts`, bypassing the cache entirely (historical
    /// reads never touch `rootFuture`).
    pub async fn root_version(&self, ts: Timestamp) -> RepoResult<Option<Group>> {
        let root_id = PathId::root();
        match self.store.get_version(EntityKind::Group, &root_id, ts)? {
            Some(blob) => {
                let stored = StoredGroup::from_blob(&root_id, &blob)?;
                Ok(Some(stored.resolve(&self.store).await?))
            }
            None => Ok(None),
        }
    }

    /// Atomically (from the cache's perspective) replace the root group.
    ///
    /// `updated_apps` are persisted first; `deleted_apps` are tombstoned
    /// best-effort. If persisting the group itself or any updated app
    /// fails, the pending promise is completed from the prior root value
    /// (a revert) and the error is returned.
    pub async fn store_root(
        &self,
        group: Group,
        updated_apps: Vec<RunSpec>,
        deleted_apps: Vec<PathId>,
    ) -> RepoResult<Arc<Group>> {
        if let Some(hook) = &self.pre_store_hook {
            hook(&group)?;
        }

        let old_future = { self.root_future.lock().await.clone() };
        let (tx, new_future) = Self::pending_future();
        {
            let mut guard = self.root_future.lock().await;
            *guard = new_future.clone();
        }

        let result = self.persist_root(&group, &updated_apps, &deleted_apps).await;

        match result {
            Ok(stored) => {
                let _ = tx.send(Ok(stored.clone()));
                Ok(stored)
            }
            Err(err) => {
                let reverted = old_future.await;
                let _ = tx.send(reverted.clone());
                Err(match reverted {
                    Ok(_) => err,
                    Err(prior_err) => (*prior_err).clone(),
                })
            }
        }
    }

    async fn persist_root(
        &self,
        group: &Group,
        updated_apps: &[RunSpec],
        deleted_apps: &[PathId],
    ) -> RepoResult<Arc<Group>> {
        group.validate()?;

        for app in updated_apps {
            let blob = serde_json::to_vec(app).map_err(|e| RepoError::Corrupt {
                path: app.id.clone(),
                source: Arc::new(e),
            })?;
            self.store.store(
                EntityKind::App,
                &app.id,
                app.version_info.last_scaling_change,
                &blob,
            )?;
        }

        for app_id in deleted_apps {
            if let Err(err) = self.store.delete_current(EntityKind::App, app_id) {
                warn!(%app_id, %err, "best-effort app deletion failed during storeRoot");
            }
        }

        let stored = StoredGroup::from_group(group);
        let blob = stored.to_blob()?;
        self.store
            .store(EntityKind::Group, &group.id, group.version.last_scaling_change, &blob)?;

        Ok(Arc::new(group.clone()))
    }

    pub fn get(&self, app_id: &PathId) -> RepoResult<Option<RunSpec>> {
        match self.store.get(EntityKind::App, app_id)? {
            Some((_, blob)) => Ok(Some(Self::deserialize_app(app_id, &blob)?)),
            None => Ok(None),
        }
    }

    pub fn get_version(&self, app_id: &PathId, ts: Timestamp) -> RepoResult<Option<RunSpec>> {
        match self.store.get_version(EntityKind::App, app_id, ts)? {
            Some(blob) => Ok(Some(Self::deserialize_app(app_id, &blob)?)),
            None => Ok(None),
        }
    }

    pub fn store(&self, app: &RunSpec) -> RepoResult<()> {
        app.validate()?;
        let blob = serde_json::to_vec(app).map_err(|e| RepoError::Corrupt {
            path: app.id.clone(),
            source: Arc::new(e),
        })?;
        self.store
            .store(EntityKind::App, &app.id, app.version_info.last_scaling_change, &blob)?;
        Ok(())
    }

    pub fn delete_current(&self, app_id: &PathId) -> RepoResult<()> {
        self.store.delete_current(EntityKind::App, app_id)?;
        Ok(())
    }

    pub fn ids(&self) -> RepoResult<Vec<PathId>> {
        Ok(self.store.ids(EntityKind::App)?)
    }

    fn deserialize_app(app_id: &PathId, blob: &[u8]) -> RepoResult<RunSpec> {
        serde_json::from_slice(blob).map_err(|e| RepoError::Corrupt {
            path: app_id.clone(),
            source: Arc::new(e),
        })
    }
}

