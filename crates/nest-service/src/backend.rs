use async_trait::async_trait;
use nest_tree::{CommentNode, Replies};

use crate::error::ServiceResult;
use crate::service::CommentService;

/// The remote half of a comment thread.
///
/// [`ThreadSession`](crate::ThreadSession) drives any implementation; the
/// service is the production one.
#[async_trait]
pub trait CommentBackend: Send + Sync {
    /// Every comment, nested.
    async fn get_comments(&self) -> ServiceResult<Replies>;

    /// Create a comment and return it as a leaf node.
    async fn add_comment(&self, content: &str, parent_id: Option<&str>)
        -> ServiceResult<CommentNode>;

    /// Delete a comment with its descendants. Returns how many were removed.
    async fn delete_comment(&self, id: &str) -> ServiceResult<usize>;
}

#[async_trait]
impl CommentBackend for CommentService {
    async fn get_comments(&self) -> ServiceResult<Replies> {
        CommentService::get_comments(self).await
    }

    async fn add_comment(
        &self,
        content: &str,
        parent_id: Option<&str>,
    ) -> ServiceResult<CommentNode> {
        CommentService::add_comment(self, content, parent_id).await
    }

    async fn delete_comment(&self, id: &str) -> ServiceResult<usize> {
        CommentService::delete_comment(self, id).await
    }
}

#[async_trait]
impl<B: CommentBackend + ?Sized> CommentBackend for std::sync::Arc<B> {
    async fn get_comments(&self) -> ServiceResult<Replies> {
        (**self).get_comments().await
    }

    async fn add_comment(
        &self,
        content: &str,
        parent_id: Option<&str>,
    ) -> ServiceResult<CommentNode> {
        (**self).add_comment(content, parent_id).await
    }

    async fn delete_comment(&self, id: &str) -> ServiceResult<usize> {
        (**self).delete_comment(id).await
    }
}
