use nest_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Content was empty after trimming. The caller should re-prompt.
    #[error("comment content cannot be empty")]
    EmptyContent,

    /// No usable comment id was given.
    #[error("missing comment id")]
    MissingId,

    /// A write could not be completed. Nothing was changed; retrying is safe.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    /// Comments could not be read.
    #[error("failed to load comments: {0}")]
    LoadFailed(#[source] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    /// Returns `true` for environment failures a retry may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::LoadFailed(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
