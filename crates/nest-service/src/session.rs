use nest_tree::{append_root, insert_reply, remove_subtree, CommentNode, Replies};
use nest_types::normalize_content;
use tracing::warn;

use crate::backend::CommentBackend;
use crate::error::{ServiceError, ServiceResult};

/// A locally held comment thread kept in sync with a backend.
///
/// Writes go to the backend first and are then applied to the local tree
/// with the tree editor, so untouched branches keep their identity and no
/// full reload is needed. A new reply is appended to its siblings without
/// re-sorting; the next [`refresh`](Self::refresh) restores creation order.
pub struct ThreadSession<B> {
    backend: B,
    comments: Replies,
    loading: bool,
    error: Option<String>,
}

impl<B: CommentBackend> ThreadSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            comments: Replies::empty(),
            loading: false,
            error: None,
        }
    }

    pub fn comments(&self) -> &Replies {
        &self.comments
    }

    /// `true` while a refresh is in flight.
    ///
    /// Only observable from outside when a refresh future was dropped before
    /// it finished (a timeout, a cancelled task). The flag then stays set
    /// until the next refresh completes.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message of the last failed operation, cleared by the next success.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reload the whole thread. On failure the previous tree is kept.
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        self.loading = true;
        let result = self.backend.get_comments().await;
        self.loading = false;

        let tree = self.record(result)?;
        self.comments = tree;
        Ok(())
    }

    /// Post a top-level comment and append it to the end of the roots.
    pub async fn add(&mut self, content: &str) -> ServiceResult<CommentNode> {
        let content = self.validate(content)?;
        let result = self.backend.add_comment(&content, None).await;
        let node = self.record(result)?;
        self.comments = append_root(&self.comments, node.clone());
        Ok(node)
    }

    /// Post a reply and append it under `parent_id` in the local tree.
    ///
    /// If the parent is not in the local tree the reply is stored but not
    /// shown until the next refresh.
    pub async fn add_reply(&mut self, parent_id: &str, content: &str) -> ServiceResult<CommentNode> {
        let content = self.validate(content)?;
        let result = self.backend.add_comment(&content, Some(parent_id)).await;
        let node = self.record(result)?;
        self.comments = insert_reply(&self.comments, parent_id, node.clone());
        Ok(node)
    }

    /// Delete a comment and its replies, then prune them locally.
    pub async fn remove(&mut self, id: &str) -> ServiceResult<usize> {
        let result = self.backend.delete_comment(id).await;
        let removed = self.record(result)?;
        self.comments = remove_subtree(&self.comments, id);
        Ok(removed)
    }

    fn validate(&mut self, content: &str) -> ServiceResult<String> {
        let result = normalize_content(content).map_err(|_| ServiceError::EmptyContent);
        self.record(result)
    }

    fn record<T>(&mut self, result: ServiceResult<T>) -> ServiceResult<T> {
        match result {
            Ok(value) => {
                self.error = None;
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "comment thread operation failed");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl<B> std::fmt::Debug for ThreadSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSession")
            .field("comments", &self.comments.total_len())
            .field("loading", &self.loading)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
