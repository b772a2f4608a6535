//! # sched-core
//!
//! Foundational domain types for the scheduling core: hierarchical path
//! ids, versioned timestamps, run spec (application) definitions, and the
//! group tree that holds them.
//!
//! # Architecture
//!
//! ```text
//! PathId ──┬── RunSpec ──┐
//!          │             ├── Group (versioned, tree-shaped)
//!          └── Group ────┘
//! ```
//!
//! Every other crate in the workspace (`sched-store`, `sched-repo`,
//! `sched-instance`, `sched-health`, `sched-broker`, `sched-actions`,
//! `sched-deploy`, `sched-actor`) depends on this crate and none of its
//! types carry any I/O or concurrency concerns — it is pure data plus
//! validation.

pub mod error;
pub mod group;
pub mod path_id;
pub mod run_spec;
pub mod version;

pub use error::CoreError;
pub use group::Group;
pub use path_id::PathId;
pub use run_spec::{
    HealthCheckKind, HealthCheckSpec, NetworkMode, PortDefinition, PortProtocol, Residency,
    ResourceLimits, RunSpec, UpgradeStrategy,
};
pub use version::{Timestamp, VersionInfo};
