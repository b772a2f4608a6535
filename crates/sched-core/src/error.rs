//! Error types shared by the scheduling core domain model.

use thiserror::Error;

use crate::path_id::PathId;

/// Errors raised while constructing or validating core domain types.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("validation failed for {path}: {reason}")]
    Validation { path: PathId, reason: String },

    #[error("dependency cycle detected involving {0}")]
    DependencyCycle(PathId),

    #[error("duplicate app id {0} within group")]
    DuplicateApp(PathId),

    #[error("duplicate group id {0} within parent")]
    DuplicateGroup(PathId),

    #[error("unknown app {0}")]
    UnknownApp(PathId),

    #[error("unknown group {0}")]
    UnknownGroup(PathId),
}

impl CoreError {
    pub fn validation(path: PathId, reason: impl Into<String>) -> Self {
        Self::Validation {
            path,
            reason: reason.into(),
        }
    }
}
