//! Read side: views handed to the rendering layer.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::try_join_all;
use inkpress_api_types::{
    AuthorPostsView, AuthorView, DashboardPostView, PostSummaryView, PostView, TagCountView,
    TagView,
};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{PostsRepo, TagsRepo, UsersRepo};
use crate::domain::entities::{PostRecord, UserRecord};

#[derive(Clone)]
pub struct PostQueries {
    posts: Arc<dyn PostsRepo>,
    tags: Arc<dyn TagsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl PostQueries {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        tags: Arc<dyn TagsRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self { posts, tags, users }
    }

    pub async fn post_by_slug(&self, slug: &str) -> Result<PostView, AppError> {
        let post = self
            .posts
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::not_found("post"))?;

        let (author, tags) = tokio::try_join!(
            self.author_of(&post),
            async { self.tags.list_for_post(post.id).await.map_err(AppError::from) },
        )?;

        Ok(PostView {
            title: post.title,
            html: post.rendered_html,
            slug: post.slug,
            author: author_view(&author),
            tags: tags
                .into_iter()
                .map(|tag| TagView {
                    name: tag.name,
                    slug: tag.slug,
                })
                .collect(),
            cover_image_url: post.cover_image_url,
            created_at: post.created_at,
        })
    }

    /// Newest posts first.
    pub async fn recent_posts(&self, limit: u32) -> Result<Vec<PostSummaryView>, AppError> {
        let posts = self.posts.list_recent(limit).await?;
        self.summaries(posts).await
    }

    pub async fn posts_by_tag(&self, tag_slug: &str) -> Result<Vec<PostSummaryView>, AppError> {
        let tag = self
            .tags
            .find_by_slug(tag_slug)
            .await?
            .ok_or_else(|| AppError::not_found("tag"))?;
        let posts = self.posts.list_by_tag(tag.id).await?;
        self.summaries(posts).await
    }

    pub async fn posts_by_author(
        &self,
        normalized_user_name: &str,
    ) -> Result<AuthorPostsView, AppError> {
        let author = self
            .users
            .find_by_normalized_name(normalized_user_name)
            .await?
            .ok_or_else(|| AppError::not_found("author"))?;
        let posts = self.posts.list_by_author(author.id).await?;

        let author = author_view(&author);
        let posts = posts
            .into_iter()
            .map(|post| summary_view(post, author.clone()))
            .collect();
        Ok(AuthorPostsView { author, posts })
    }

    pub async fn dashboard_posts(&self, user_id: Uuid) -> Result<Vec<DashboardPostView>, AppError> {
        let posts = self.posts.list_by_author(user_id).await?;
        Ok(posts
            .into_iter()
            .map(|post| DashboardPostView {
                id: post.id,
                title: post.title,
                slug: post.slug,
            })
            .collect())
    }

    /// Tags used by at least one post, most used first.
    pub async fn tag_counts(&self) -> Result<Vec<TagCountView>, AppError> {
        let tags = self.tags.list_with_counts().await?;
        Ok(tags
            .into_iter()
            .filter(|tag| tag.count > 0)
            .map(|tag| TagCountView {
                name: tag.name,
                slug: tag.slug,
                post_count: tag.count,
            })
            .collect())
    }

    async fn author_of(&self, post: &PostRecord) -> Result<UserRecord, AppError> {
        self.users
            .find_by_id(post.author_id)
            .await?
            .ok_or_else(|| AppError::not_found("author"))
    }

    async fn summaries(&self, posts: Vec<PostRecord>) -> Result<Vec<PostSummaryView>, AppError> {
        let author_ids: BTreeSet<Uuid> = posts.iter().map(|post| post.author_id).collect();
        let authors = try_join_all(author_ids.into_iter().map(|id| async move {
            let user = self
                .users
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("author"))?;
            Ok::<_, AppError>((id, author_view(&user)))
        }))
        .await?;
        let authors: HashMap<Uuid, AuthorView> = authors.into_iter().collect();

        posts
            .into_iter()
            .map(|post| {
                let author = authors
                    .get(&post.author_id)
                    .cloned()
                    .ok_or_else(|| AppError::not_found("author"))?;
                Ok(summary_view(post, author))
            })
            .collect()
    }
}

fn author_view(user: &UserRecord) -> AuthorView {
    AuthorView {
        user_name: user.user_name.clone(),
        normalized_user_name: user.normalized_user_name.clone(),
    }
}

fn summary_view(post: PostRecord, author: AuthorView) -> PostSummaryView {
    PostSummaryView {
        title: post.title,
        slug: post.slug,
        author,
        cover_image_url: post.cover_image_url,
        created_at: post.created_at,
    }
}
