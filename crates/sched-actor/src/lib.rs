//! The scheduler actor (spec §4.1) — the single serialization point for
//! cluster-wide scheduling commands.

pub mod actor;
pub mod command;
pub mod error;
pub mod handle;

pub use actor::{SchedulerActor, CANCELLATION_TIMEOUT};
pub use command::{Command, Envelope, Reply};
pub use error::ActorError;
pub use handle::{ActorHandle, COMMAND_CHANNEL_CAPACITY};
