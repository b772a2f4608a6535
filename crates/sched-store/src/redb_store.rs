//! redb-backed implementation of [`PersistentStore`].

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use sched_core::{PathId, Timestamp};
use tracing::debug;

use crate::error::StoreError;
use crate::error::StoreResult;
use crate::kind::EntityKind;
use crate::tables::{CURRENT, VERSIONS};
use crate::traits::PersistentStore;

macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// A redb-backed, thread-safe, versioned persistent store.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "persistent store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory persistent store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(CURRENT).map_err(map_err!(Table))?;
        txn.open_table(VERSIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn current_key(kind: EntityKind, path: &PathId) -> String {
        format!("{kind}{path}")
    }

    fn version_key(kind: EntityKind, path: &PathId, version: Timestamp) -> String {
        format!("{kind}{path}@{}", version.to_rfc3339())
    }

    fn version_prefix(kind: EntityKind, path: &PathId) -> String {
        format!("{kind}{path}@")
    }

    fn kind_prefix(kind: EntityKind) -> String {
        kind.to_string()
    }
}

impl PersistentStore for RedbStore {
    fn get(&self, kind: EntityKind, path: &PathId) -> StoreResult<Option<(Timestamp, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let current = txn.open_table(CURRENT).map_err(map_err!(Table))?;
        let Some(guard) = current
            .get(Self::current_key(kind, path).as_str())
            .map_err(map_err!(Read))?
        else {
            return Ok(None);
        };
        let version = Timestamp::parse(guard.value())
            .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        drop(guard);

        let versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
        let key = Self::version_key(kind, path, version);
        match versions.get(key.as_str()).map_err(map_err!(Read))? {
            Some(blob) => Ok(Some((version, blob.value().to_vec()))),
            None => Ok(None),
        }
    }

    fn get_version(
        &self,
        kind: EntityKind,
        path: &PathId,
        version: Timestamp,
    ) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
        let key = Self::version_key(kind, path, version);
        match versions.get(key.as_str()).map_err(map_err!(Read))? {
            Some(blob) => Ok(Some(blob.value().to_vec())),
            None => Ok(None),
        }
    }

    fn store(
        &self,
        kind: EntityKind,
        path: &PathId,
        version: Timestamp,
        blob: &[u8],
    ) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
            versions
                .insert(Self::version_key(kind, path, version).as_str(), blob)
                .map_err(map_err!(Write))?;
            let mut current = txn.open_table(CURRENT).map_err(map_err!(Table))?;
            current
                .insert(
                    Self::current_key(kind, path).as_str(),
                    version.to_rfc3339().as_str(),
                )
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%kind, %path, version = %version.to_rfc3339(), "entity stored");
        Ok(())
    }

    fn delete_current(&self, kind: EntityKind, path: &PathId) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut current = txn.open_table(CURRENT).map_err(map_err!(Table))?;
            current
                .remove(Self::current_key(kind, path).as_str())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%kind, %path, "entity tombstoned");
        Ok(())
    }

    fn delete_version(&self, kind: EntityKind, path: &PathId, version: Timestamp) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
            versions
                .remove(Self::version_key(kind, path, version).as_str())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn versions(&self, kind: EntityKind, path: &PathId) -> StoreResult<Vec<Timestamp>> {
        let prefix = Self::version_prefix(kind, path);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
        let mut out = Vec::new();
        for entry in versions.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if let Some(rest) = key.strip_prefix(&prefix) {
                let ts = Timestamp::parse(rest).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
                out.push(ts);
            }
        }
        out.sort();
        Ok(out)
    }

    fn ids(&self, kind: EntityKind) -> StoreResult<Vec<PathId>> {
        let prefix = Self::kind_prefix(kind);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let current = txn.open_table(CURRENT).map_err(map_err!(Table))?;
        let mut out = Vec::new();
        for entry in current.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if let Some(rest) = key.strip_prefix(&prefix) {
                let path = PathId::parse(rest).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
                out.push(path);
            }
        }
        Ok(out)
    }
}
