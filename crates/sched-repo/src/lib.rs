//! # sched-repo
//!
//! The Group/App versioned repository (spec §4.5): a read/write-through
//! cache in front of [`sched_store::PersistentStore`] that guarantees
//! read-after-write consistency for the root application tree.
//!
//! # Architecture
//!
//! ```text
//! GroupRepository
//!   ├── root_future: Shared<Future<Output = Result<Arc<Group>, Arc<RepoError>>>>
//!   │     (the RAW cache cell — see repository.rs module docs)
//!   └── store: Arc<dyn PersistentStore>
//!         (sched-store; (entityKind, path, version) -> opaque blob)
//! ```
//!
//! `RunSpec` reads/writes bypass the cache entirely — only the root group
//! is cached, matching spec §4.5's scope.

pub mod error;
pub mod repository;
pub mod stored_group;

pub use error::{RepoError, RepoResult};
pub use repository::{GroupRepository, PreStoreHook};
pub use stored_group::StoredGroup;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sched_core::{
        Group, NetworkMode, PathId, PortDefinition, PortProtocol, ResourceLimits, RunSpec,
        Timestamp, UpgradeStrategy, VersionInfo,
    };
    use sched_store::{PersistentStore, RedbStore};

    use super::*;

    fn store() -> Arc<dyn PersistentStore> {
        Arc::new(RedbStore::open_in_memory().unwrap())
    }

    fn app(id: &str, version: Timestamp) -> RunSpec {
        RunSpec {
            id: PathId::parse(id).unwrap(),
            command: "run".into(),
            args: vec![],
            resources: ResourceLimits {
                cpu_shares: 1.0,
                mem_bytes: 64 * 1024 * 1024,
                disk_bytes: 0,
                gpu: 0,
            },
            instances: 1,
            network: NetworkMode::Ports(vec![PortDefinition {
                name: "http".into(),
                container_port: Some(80),
                protocol: PortProtocol::Tcp,
            }]),
            health_checks: vec![],
            upgrade_strategy: UpgradeStrategy::default(),
            dependencies: vec![],
            residency: None,
            secrets: Default::default(),
            version_info: VersionInfo::fresh_at(version),
        }
    }

    #[tokio::test]
    async fn fresh_repository_has_empty_root() {
        let repo = GroupRepository::new(store());
        let root = repo.root().await.unwrap();
        assert!(root.apps.is_empty() && root.subgroups.is_empty());
    }

    #[tokio::test]
    async fn store_root_is_visible_on_next_read_without_hitting_store_again() {
        let repo = GroupRepository::new(store());
        let v = Timestamp::now();
        let a = app("/prod/api", v);

        let mut group = Group::empty_root(VersionInfo::fresh_at(v));
        group.apps.insert(a.id.clone(), a.clone());

        let stored = repo
            .store_root(group.clone(), vec![a], vec![])
            .await
            .unwrap();
        assert_eq!(stored.apps.len(), 1);

        let read_back = repo.root().await.unwrap();
        assert_eq!(read_back.apps.len(), 1);
        assert!(read_back.apps.contains_key(&PathId::parse("/prod/api").unwrap()));
    }

    #[tokio::test]
    async fn store_root_rejects_invalid_group_and_does_not_clobber_cache() {
        let repo = GroupRepository::new(store());
        let v = Timestamp::now();
        let a = app("/prod/api", v);
        let mut good_group = Group::empty_root(VersionInfo::fresh_at(v));
        good_group.apps.insert(a.id.clone(), a.clone());
        repo.store_root(good_group, vec![a], vec![]).await.unwrap();

        // a group whose app is outside its own subtree is invalid
        let mut bad_app = app("/other/app", Timestamp::now());
        bad_app.id = PathId::parse("/other/app").unwrap();
        let mut bad_group = Group::empty_root(VersionInfo::fresh_at(Timestamp::now()));
        bad_group.id = PathId::parse("/prod").unwrap();
        bad_group.apps.insert(bad_app.id.clone(), bad_app.clone());

        let err = repo.store_root(bad_group, vec![bad_app], vec![]).await;
        assert!(err.is_err());

        let root = repo.root().await.unwrap();
        assert_eq!(root.apps.len(), 1);
    }

    #[test]
    fn app_round_trips_independent_of_root_cache() {
        let s = store();
        let repo = GroupRepository::new(s);
        let a = app("/standalone", Timestamp::now());
        repo.store(&a).unwrap();
        let got = repo.get(&a.id).unwrap().unwrap();
        assert_eq!(got.id, a.id);
    }

    #[test]
    fn delete_current_tombstones_app() {
        let s = store();
        let repo = GroupRepository::new(s);
        let a = app("/standalone", Timestamp::now());
        repo.store(&a).unwrap();
        repo.delete_current(&a.id).unwrap();
        assert!(repo.get(&a.id).unwrap().is_none());
    }
}
