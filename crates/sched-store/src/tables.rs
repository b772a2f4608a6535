//! redb table definitions for the versioned persistent store.
//!
//! Two tables carry the whole schema: `CURRENT` maps a `{kind}/{path}` key
//! to the RFC 3339 timestamp of the version that is presently current for
//! that path (its absence means the path is tombstoned or never written);
//! `VERSIONS` maps `{kind}/{path}@{timestamp}` to the opaque blob for that
//! revision and is append-only in practice (entries are pruned only by
//! explicit `delete_version` calls).

use redb::TableDefinition;

pub const CURRENT: TableDefinition<&str, &str> = TableDefinition::new("current");
pub const VERSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("versions");
