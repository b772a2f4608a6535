//! # sched-store
//!
//! The persistent-store surface (spec §6): a versioned key-value store
//! indexed by `(entityKind, path, version)`, plus a redb-backed
//! implementation.
//!
//! This crate treats stored values as opaque blobs; it knows nothing about
//! `RunSpec` or `Group` shapes. The Group/App repository in `sched-repo`
//! is responsible for (de)serializing domain types into and out of it.

pub mod error;
pub mod kind;
pub mod redb_store;
pub mod tables;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use kind::EntityKind;
pub use redb_store::RedbStore;
pub use traits::PersistentStore;
