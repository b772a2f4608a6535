//! # sched-instance
//!
//! The instance/task domain model, the pure instance status state machine
//! (spec §4.4), and the in-memory instance tracker that owns it (spec §3
//! ownership rules, spec §5 sync/async read split).
//!
//! # Architecture
//!
//! ```text
//! InstanceTracker (owns the map)
//!   └── apply(op) -> operation::apply_operation (pure) -> InstanceUpdateEffect
//!                                                            │
//!                                            Update / Expunge / Noop / Failure
//! ```

pub mod error;
pub mod ids;
pub mod instance;
pub mod operation;
pub mod status;
pub mod task;
pub mod tracker;

pub use error::InstanceError;
pub use ids::{AgentInfo, InstanceId, TaskId};
pub use instance::{Instance, InstanceState};
pub use operation::{apply_operation, InstanceUpdateEffect, InstanceUpdateOperation};
pub use status::{aggregate_health, aggregate_status, InstanceStatus};
pub use task::{BrokerTaskStatus, Task, TaskState};
pub use tracker::InstanceTracker;
