//! The `PersistentStore` surface (spec §6).
//!
//! A versioned key-value store indexed by `(entityKind, path, version)`.
//! The core requires read-after-write per key; cross-key atomicity is not
//! required and is emulated above this trait by the repository's
//! `rootFuture` revert discipline (see `sched-repo`).

use sched_core::{PathId, Timestamp};

use crate::error::StoreResult;
use crate::kind::EntityKind;

/// The persistent-store surface consumed by the Group/App repository.
///
/// Implementors must guarantee that a `store` call is visible to the next
/// `get`/`get_version` call on the same path from the same process — the
/// stronger cross-key atomicity guarantees (e.g. atomic multi-app commit)
/// are the repository's responsibility, not this trait's.
pub trait PersistentStore: Send + Sync {
    /// The current version's blob for `path`, if one is stored and not
    /// tombstoned.
    fn get(&self, kind: EntityKind, path: &PathId) -> StoreResult<Option<(Timestamp, Vec<u8>)>>;

    /// The blob stored for `path` at exactly `version`, regardless of
    /// whether that version is still current.
    fn get_version(
        &self,
        kind: EntityKind,
        path: &PathId,
        version: Timestamp,
    ) -> StoreResult<Option<Vec<u8>>>;

    /// Store `blob` as the new current version of `path` at `version`.
    fn store(
        &self,
        kind: EntityKind,
        path: &PathId,
        version: Timestamp,
        blob: &[u8],
    ) -> StoreResult<()>;

    /// Tombstone `path`: subsequent `get` calls return `None`, but prior
    /// versions remain retrievable via `get_version`.
    fn delete_current(&self, kind: EntityKind, path: &PathId) -> StoreResult<()>;

    /// Permanently remove one specific version's blob.
    fn delete_version(&self, kind: EntityKind, path: &PathId, version: Timestamp) -> StoreResult<()>;

    /// All versions retained for `path`, oldest first.
    fn versions(&self, kind: EntityKind, path: &PathId) -> StoreResult<Vec<Timestamp>>;

    /// All paths with a non-tombstoned current version under `kind`.
    fn ids(&self, kind: EntityKind) -> StoreResult<Vec<PathId>>;
}
