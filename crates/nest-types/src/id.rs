use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier assigned to a comment when it is created.
///
/// Backed by a UUID v7, so identifiers roughly sort in creation order.
/// Stored records carry the identifier as a plain string;
/// foreign or hand-written ids are accepted there as long as they are not
/// blank.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommentId(uuid::Uuid);

impl CommentId {
    /// Generate a new time-ordered comment ID (UUID v7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommentId({})", self.short_id())
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TypeError::InvalidId(s.to_string()))
    }
}

impl From<CommentId> for String {
    fn from(id: CommentId) -> Self {
        id.to_string()
    }
}

/// Check that a record id can address a stored comment.
///
/// Only blank ids are rejected; the store keys records by arbitrary strings.
pub fn validate_id(id: &str) -> Result<&str, TypeError> {
    if id.trim().is_empty() {
        return Err(TypeError::InvalidId(id.to_string()));
    }
    Ok(id)
}
