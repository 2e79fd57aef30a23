use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::images::ImageIngestor;
use crate::application::invalidation::{InvalidationSink, InvalidationTarget};
use crate::application::render::RenderService;
use crate::application::repos::{PostsRepo, PostsWriteRepo, TagsRepo, TagsWriteRepo};
use crate::application::session::AuthenticatedUserId;
use crate::application::slugs::SlugAllocator;
use crate::application::storage::BlobStore;
use crate::application::tags::TagResolver;
use crate::domain::entities::PostRecord;
use crate::domain::uploads::ImageBounds;

use super::types::{PipelineOp, PipelineStage};

/// Collaborators the pipeline is assembled from.
#[derive(Clone)]
pub struct PipelineDeps {
    pub posts: Arc<dyn PostsRepo>,
    pub posts_writer: Arc<dyn PostsWriteRepo>,
    pub tags: Arc<dyn TagsRepo>,
    pub tags_writer: Arc<dyn TagsWriteRepo>,
    pub blob_store: Arc<dyn BlobStore>,
    pub renderer: Arc<dyn RenderService>,
    pub invalidation: Arc<dyn InvalidationSink>,
    pub image_bounds: ImageBounds,
}

/// Orchestrates post creation, editing and deletion.
///
/// Sub-steps run as concurrently awaited futures inside the caller's task.
/// Nothing is persisted until every sub-result is available.
#[derive(Clone)]
pub struct PostPipeline {
    pub(super) posts: Arc<dyn PostsRepo>,
    pub(super) writer: Arc<dyn PostsWriteRepo>,
    pub(super) tag_reader: Arc<dyn TagsRepo>,
    pub(super) slugs: SlugAllocator,
    pub(super) tags: TagResolver,
    pub(super) renderer: Arc<dyn RenderService>,
    pub(super) images: ImageIngestor,
    pub(super) invalidation: Arc<dyn InvalidationSink>,
}

impl PostPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            slugs: SlugAllocator::new(deps.posts.clone()),
            tags: TagResolver::new(deps.tags.clone(), deps.tags_writer),
            images: ImageIngestor::new(deps.blob_store, deps.image_bounds),
            posts: deps.posts,
            writer: deps.posts_writer,
            tag_reader: deps.tags,
            renderer: deps.renderer,
            invalidation: deps.invalidation,
        }
    }

    pub(super) fn stage(&self, op: PipelineOp, stage: PipelineStage) {
        debug!(op = op.as_str(), stage = stage.as_str(), "Pipeline stage");
    }

    /// Record the outcome of a pipeline run.
    pub(super) fn observe<T>(
        &self,
        op: PipelineOp,
        result: Result<T, AppError>,
    ) -> Result<T, AppError> {
        match &result {
            Ok(_) => {
                self.stage(op, PipelineStage::Persisted);
                let name = match op {
                    PipelineOp::Create => "inkpress_posts_created_total",
                    PipelineOp::Edit => "inkpress_posts_updated_total",
                    PipelineOp::Delete => "inkpress_posts_deleted_total",
                };
                counter!(name).increment(1);
            }
            Err(err) => {
                let kind = err.kind().as_str();
                warn!(
                    op = op.as_str(),
                    stage = PipelineStage::Failed.as_str(),
                    kind,
                    error = %err,
                    "Pipeline failed"
                );
                counter!("inkpress_pipeline_failures_total", "kind" => kind).increment(1);
            }
        }
        result
    }

    pub(super) async fn load_owned_post(
        &self,
        user: AuthenticatedUserId,
        post_id: Uuid,
        action: &str,
    ) -> Result<PostRecord, AppError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post"))?;

        if post.author_id != user.as_uuid() {
            return Err(AppError::unauthorized(format!(
                "Only the author may {action} this post"
            )));
        }

        Ok(post)
    }

    /// Best-effort removal of a blob uploaded by a run that then failed.
    pub(super) async fn compensate_upload(&self, public_url: &str) {
        info!(url = public_url, "Removing blob uploaded by failed run");
        self.images.delete(public_url).await;
    }

    pub(super) fn invalidate(&self, targets: impl IntoIterator<Item = InvalidationTarget>) {
        for target in targets {
            self.invalidation.emit(target);
        }
    }
}
