use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("comment content is empty")]
    EmptyContent,

    #[error("invalid comment id: {0:?}")]
    InvalidId(String),
}
