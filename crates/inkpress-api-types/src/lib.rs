//! Shared view types produced by the inkpress read side and pipeline.
//!
//! These are plain serde structures so rendering layers (templates, JSON
//! handlers, the CLI) can consume them without depending on the pipeline crate.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Display fields for a post author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorView {
    pub user_name: String,
    pub normalized_user_name: String,
}

/// Display fields for a tag attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagView {
    pub name: String,
    pub slug: String,
}

/// Full post as handed to the article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub title: String,
    /// Sanitized HTML, safe to inject verbatim.
    pub html: String,
    pub slug: String,
    pub author: AuthorView,
    pub tags: Vec<TagView>,
    pub cover_image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Card-sized post entry used by listing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummaryView {
    pub title: String,
    pub slug: String,
    pub author: AuthorView,
    pub cover_image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Posts written by a single author, together with the author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorPostsView {
    pub author: AuthorView,
    pub posts: Vec<PostSummaryView>,
}

/// Row in an author's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardPostView {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCountView {
    pub name: String,
    pub slug: String,
    pub post_count: u64,
}

/// Failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Unauthorized,
    Upload,
    Storage,
    NotFound,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Upload => "upload",
            FailureKind::Storage => "storage",
            FailureKind::NotFound => "not_found",
            FailureKind::Internal => "internal",
        }
    }
}

/// Structured failure returned to callers. Never carries internal identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}
