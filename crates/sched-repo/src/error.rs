//! Error types for the Group/App versioned repository.

use std::sync::Arc;

use sched_core::{CoreError, PathId};
use sched_store::StoreError;
use thiserror::Error;

/// Result type alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("persistent store failure: {0}")]
    Store(Arc<StoreError>),

    #[error("stored entity failed to deserialize for {path}: {source}")]
    Corrupt {
        path: PathId,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("pre-store hook rejected the write: {0}")]
    PreStoreRejected(String),

    #[error("root load was cancelled before completion")]
    Cancelled,
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        RepoError::Store(Arc::new(value))
    }
}
