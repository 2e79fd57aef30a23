use std::collections::BTreeSet;

use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::invalidation::InvalidationTarget;
use crate::application::repos::{CreatePostParams, RepoError};
use crate::application::session::{AuthenticatedUserId, Session};
use crate::domain::entities::PostRecord;
use crate::domain::posts::{validate_markdown, validate_title};
use crate::domain::tags::normalize_tag_names;

use super::service::PostPipeline;
use super::types::{CreatePostCommand, PipelineOp, PipelineStage};

/// Slug allocation is retried this many times when a concurrent writer takes
/// the allocated slug before the insert lands.
pub const MAX_PERSIST_ATTEMPTS: usize = 3;

impl PostPipeline {
    /// Create a post from author input and return the stored record.
    pub async fn create_post(
        &self,
        session: &Session,
        command: CreatePostCommand,
    ) -> Result<PostRecord, AppError> {
        let result = self.run_create(session, command).await;
        self.observe(PipelineOp::Create, result)
    }

    async fn run_create(
        &self,
        session: &Session,
        command: CreatePostCommand,
    ) -> Result<PostRecord, AppError> {
        let op = PipelineOp::Create;
        self.stage(op, PipelineStage::Validating);

        let author = session.require()?;
        validate_title(&command.title)?;
        validate_markdown(&command.markdown)?;
        let tag_names = normalize_tag_names(&command.tags)?;
        self.images.validate(&command.cover_image)?;

        self.stage(op, PipelineStage::AwaitingSubtasks);
        let (image, tag_ids, html) = tokio::join!(
            self.images.upload(&command.cover_image),
            self.tags.resolve_normalized(&tag_names),
            async { self.renderer.render(&command.markdown) },
        );

        // Errors surface in order: image, tags, markdown.
        let cover_image_url = image?;
        let assembled = match (tag_ids, html) {
            (Ok(tag_ids), Ok(html)) => Ok((tag_ids, html)),
            (Err(err), _) => Err(AppError::from(err)),
            (_, Err(err)) => Err(AppError::from(err)),
        };
        let (tag_ids, rendered_html) = match assembled {
            Ok(parts) => parts,
            Err(err) => {
                self.compensate_upload(&cover_image_url).await;
                return Err(err);
            }
        };

        self.stage(op, PipelineStage::Assembling);
        let draft = PostDraft {
            title: command.title.trim().to_string(),
            markdown_source: command.markdown,
            rendered_html,
            author,
            tag_ids,
            cover_image_url,
        };

        match self.persist_new(&draft).await {
            Ok(post) => {
                info!(post_id = %post.id, slug = %post.slug, "Post created");
                self.invalidate([
                    InvalidationTarget::Home,
                    InvalidationTarget::AuthorDashboard {
                        author_id: post.author_id,
                    },
                ]);
                Ok(post)
            }
            Err(err) => {
                self.compensate_upload(&draft.cover_image_url).await;
                Err(err)
            }
        }
    }

    async fn persist_new(&self, draft: &PostDraft) -> Result<PostRecord, AppError> {
        let mut attempt = 1;
        loop {
            let slug = self.slugs.allocate(&draft.title).await?;
            let params = CreatePostParams {
                slug: slug.clone(),
                title: draft.title.clone(),
                markdown_source: draft.markdown_source.clone(),
                rendered_html: draft.rendered_html.clone(),
                author_id: draft.author.as_uuid(),
                tag_ids: draft.tag_ids.iter().copied().collect(),
                cover_image_url: draft.cover_image_url.clone(),
            };

            match self.writer.create_post(params).await {
                Ok(post) => return Ok(post),
                Err(RepoError::Duplicate { constraint }) if attempt < MAX_PERSIST_ATTEMPTS => {
                    warn!(
                        slug = %slug,
                        constraint = %constraint,
                        attempt,
                        "Slug taken concurrently, reallocating"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

struct PostDraft {
    title: String,
    markdown_source: String,
    rendered_html: String,
    author: AuthenticatedUserId,
    tag_ids: BTreeSet<Uuid>,
    cover_image_url: String,
}
