//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{PostRecord, SessionRecord, TagRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub slug: String,
    pub title: String,
    pub markdown_source: String,
    pub rendered_html: String,
    pub author_id: Uuid,
    pub tag_ids: Vec<Uuid>,
    pub cover_image_url: String,
}

/// Partial post update. `None` leaves the stored column untouched.
///
/// `markdown_source` and `rendered_html` travel together: the write side
/// rejects a change that sets one without the other.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub markdown_source: Option<String>,
    pub rendered_html: Option<String>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub cover_image_url: Option<String>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.title.is_none()
            && self.markdown_source.is_none()
            && self.rendered_html.is_none()
            && self.tag_ids.is_none()
            && self.cover_image_url.is_none()
    }

    pub fn check_body_pairing(&self) -> Result<(), RepoError> {
        if self.markdown_source.is_some() != self.rendered_html.is_some() {
            return Err(RepoError::InvalidInput {
                message: "markdown_source and rendered_html must be updated together".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    /// Newest first.
    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;

    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError>;

    /// Newest first.
    async fn list_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Insert the post row and its tag links. A taken slug fails with
    /// [`RepoError::Duplicate`].
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post_partial(
        &self,
        id: Uuid,
        changes: PostChanges,
    ) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWithCount {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub count: u64,
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn find_by_normalized_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;
    /// Tags used by at least one post, most used first.
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub slug: String,
    pub name: String,
}

#[async_trait]
pub trait TagsWriteRepo: Send + Sync {
    /// A concurrent creator of the same name surfaces as [`RepoError::Duplicate`].
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;
    async fn find_by_normalized_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError>;
}
