//! Error types for the versioned persistent store.

use thiserror::Error;

/// Result type alias for persistent-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during persistent-store operations.
///
/// Maps onto spec §7's `StoreFailure` kind; callers distinguish root writes
/// (which must revert on failure) from app writes (which bubble up).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("invalid stored key: {0}")]
    InvalidKey(String),
}
