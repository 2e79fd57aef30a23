use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::invalidation::InvalidationTarget;
use crate::application::session::Session;

use super::service::PostPipeline;
use super::types::{PipelineOp, PipelineStage};

impl PostPipeline {
    /// Delete a post and reclaim its cover image.
    ///
    /// The row goes first; a failed blob delete is logged and does not fail
    /// the operation.
    pub async fn delete_post(&self, session: &Session, post_id: Uuid) -> Result<(), AppError> {
        let result = self.run_delete(session, post_id).await;
        self.observe(PipelineOp::Delete, result)
    }

    async fn run_delete(&self, session: &Session, post_id: Uuid) -> Result<(), AppError> {
        self.stage(PipelineOp::Delete, PipelineStage::Validating);

        let user = session.require()?;
        let post = self.load_owned_post(user, post_id, "delete").await?;

        self.writer.delete_post(post.id).await?;
        info!(post_id = %post.id, slug = %post.slug, "Post deleted");

        if !post.cover_image_url.is_empty() {
            self.images.delete(&post.cover_image_url).await;
        }

        self.invalidate([
            InvalidationTarget::PostDetail {
                slug: post.slug.clone(),
            },
            InvalidationTarget::Home,
            InvalidationTarget::AuthorDashboard {
                author_id: post.author_id,
            },
        ]);

        Ok(())
    }
}
