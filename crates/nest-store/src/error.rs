use std::path::PathBuf;

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The data directory could not be used.
    #[error("data directory unusable: {path}: {reason}")]
    DataDir { path: PathBuf, reason: String },

    /// The store could not be reached (e.g. its worker thread died).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record without an id cannot be stored.
    #[error("cannot store record with empty id")]
    EmptyId,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
