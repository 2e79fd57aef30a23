use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::slug::{SlugAsyncError, allocate_unique_slug};

/// Allocates post slugs, probing the posts repository for collisions.
#[derive(Clone)]
pub struct SlugAllocator {
    posts: Arc<dyn PostsRepo>,
}

impl SlugAllocator {
    pub fn new(posts: Arc<dyn PostsRepo>) -> Self {
        Self { posts }
    }

    /// Allocate a slug for a new post.
    pub async fn allocate(&self, title: &str) -> Result<String, SlugAsyncError<RepoError>> {
        self.allocate_excluding(title, None).await
    }

    /// Allocate a slug for `title`, treating slugs owned by `owner` as free.
    ///
    /// Used on edit so a retitled post whose title normalizes to the same
    /// token keeps its current slug.
    pub async fn allocate_excluding(
        &self,
        title: &str,
        owner: Option<Uuid>,
    ) -> Result<String, SlugAsyncError<RepoError>> {
        let posts = self.posts.clone();
        allocate_unique_slug(title, move |candidate| {
            let posts = posts.clone();
            async move {
                let existing = posts.find_by_slug(&candidate).await?;
                Ok::<bool, RepoError>(match existing {
                    Some(post) => Some(post.id) != owner,
                    None => false,
                })
            }
        })
        .await
    }
}
