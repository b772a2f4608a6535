//! Errors for the instance state machine (spec §7 `InstanceUpdateFailure`).

use thiserror::Error;

use crate::ids::{InstanceId, TaskId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("instance {0} already exists")]
    AlreadyExists(InstanceId),

    #[error("instance {0} is not known to the tracker")]
    UnknownInstance(InstanceId),

    #[error("task {0} is not known on its instance")]
    UnknownTask(TaskId),

    #[error("operation requires the instance to be in Reserved status")]
    NotReserved,

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}
