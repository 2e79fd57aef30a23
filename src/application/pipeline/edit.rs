use std::collections::BTreeSet;

use tracing::info;

use crate::application::error::AppError;
use crate::application::invalidation::InvalidationTarget;
use crate::application::repos::PostChanges;
use crate::application::session::Session;
use crate::domain::entities::PostRecord;
use crate::domain::posts::{text_changed, validate_markdown, validate_title};
use crate::domain::tags::normalize_tag_names;

use super::service::PostPipeline;
use super::types::{ChangedFields, EditPostCommand, PipelineOp, PipelineStage};

impl PostPipeline {
    /// Apply an edit, running only the sub-pipelines for changed fields.
    pub async fn edit_post(
        &self,
        session: &Session,
        command: EditPostCommand,
    ) -> Result<PostRecord, AppError> {
        let result = self.run_edit(session, command).await;
        self.observe(PipelineOp::Edit, result)
    }

    async fn run_edit(
        &self,
        session: &Session,
        command: EditPostCommand,
    ) -> Result<PostRecord, AppError> {
        let op = PipelineOp::Edit;
        self.stage(op, PipelineStage::Validating);

        let user = session.require()?;
        let post = self.load_owned_post(user, command.post_id, "edit").await?;

        validate_title(&command.title)?;
        validate_markdown(&command.markdown)?;
        let tag_names = normalize_tag_names(&command.tags)?;
        if let Some(image) = &command.cover_image {
            self.images.validate(image)?;
        }

        let stored_tags: BTreeSet<String> = self
            .tag_reader
            .list_for_post(post.id)
            .await?
            .into_iter()
            .map(|tag| tag.name)
            .collect();

        let changed = ChangedFields {
            title: text_changed(&command.title, &post.title),
            body: text_changed(&command.markdown, &post.markdown_source),
            tags: tag_names != stored_tags,
            cover_image: command.cover_image.is_some(),
        };
        if changed.is_empty() {
            return Err(AppError::validation("post", "no-op edit: nothing changed"));
        }

        self.stage(op, PipelineStage::AwaitingSubtasks);
        let title = command.title.trim();
        let (image, tag_ids, html, slug) = tokio::join!(
            async {
                match &command.cover_image {
                    Some(image) => Some(self.images.upload(image).await),
                    None => None,
                }
            },
            async {
                if changed.tags {
                    Some(self.tags.resolve_normalized(&tag_names).await)
                } else {
                    None
                }
            },
            async {
                changed
                    .body
                    .then(|| self.renderer.render(&command.markdown))
            },
            async {
                if changed.title {
                    Some(self.slugs.allocate_excluding(title, Some(post.id)).await)
                } else {
                    None
                }
            },
        );

        // Errors surface in order: image, tags, markdown, slug.
        let new_image_url = image.transpose()?;
        let assembled = (|| -> Result<PostChanges, AppError> {
            let tag_ids = tag_ids.transpose()?;
            let rendered_html = html.transpose()?;
            let slug = slug.transpose()?;
            Ok(PostChanges {
                slug: slug.filter(|slug| *slug != post.slug),
                title: changed.title.then(|| title.to_string()),
                markdown_source: changed.body.then(|| command.markdown.clone()),
                rendered_html,
                tag_ids: tag_ids.map(|ids| ids.into_iter().collect()),
                cover_image_url: new_image_url.clone(),
            })
        })();

        let changes = match assembled {
            Ok(changes) => changes,
            Err(err) => {
                if let Some(url) = &new_image_url {
                    self.compensate_upload(url).await;
                }
                return Err(err);
            }
        };

        self.stage(op, PipelineStage::Assembling);
        let updated = match self.writer.update_post_partial(post.id, changes).await {
            Ok(updated) => updated,
            Err(err) => {
                if let Some(url) = &new_image_url {
                    self.compensate_upload(url).await;
                }
                return Err(err.into());
            }
        };

        info!(
            post_id = %updated.id,
            slug = %updated.slug,
            title_changed = changed.title,
            body_changed = changed.body,
            tags_changed = changed.tags,
            image_changed = changed.cover_image,
            "Post updated"
        );

        if new_image_url.is_some() && !post.cover_image_url.is_empty() {
            self.images.delete(&post.cover_image_url).await;
        }

        let mut targets = vec![InvalidationTarget::PostDetail {
            slug: post.slug.clone(),
        }];
        if updated.slug != post.slug {
            targets.push(InvalidationTarget::PostDetail {
                slug: updated.slug.clone(),
            });
        }
        targets.push(InvalidationTarget::Home);
        targets.push(InvalidationTarget::AuthorDashboard {
            author_id: updated.author_id,
        });
        self.invalidate(targets);

        Ok(updated)
    }
}
