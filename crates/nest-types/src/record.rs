use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::CommentId;
use crate::timestamp::Timestamp;

/// Flat, persisted representation of one comment.
///
/// Records are created once and never updated in place. `parent_id` names the
/// comment this one replies to; it is not guaranteed to reference an existing
/// record (the parent may already be deleted, or not yet loaded).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    /// Primary key.
    pub id: String,
    /// Trimmed, non-empty body text.
    pub content: String,
    /// Creation time; siblings are ordered by it.
    pub created_at: Timestamp,
    /// Parent comment id, `None` for a top-level comment.
    pub parent_id: Option<String>,
}

impl CommentRecord {
    /// Build a fresh record with a new id and the current time.
    ///
    /// `content` is trimmed and must not be empty afterwards. A blank
    /// `parent_id` is treated as no parent.
    pub fn create(content: &str, parent_id: Option<&str>) -> Result<Self, TypeError> {
        let content = normalize_content(content)?;
        let parent_id = parent_id
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Ok(Self {
            id: CommentId::new().to_string(),
            content,
            created_at: Timestamp::now(),
            parent_id,
        })
    }

    /// Returns `true` if this record has no parent.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Trim comment content, rejecting input that is empty after trimming.
pub fn normalize_content(content: &str) -> Result<String, TypeError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(TypeError::EmptyContent);
    }
    Ok(trimmed.to_string())
}
