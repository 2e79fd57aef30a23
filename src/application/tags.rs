//! Lazy tag resolution for the ingestion pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::try_join_all;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{CreateTagParams, RepoError, TagsRepo, TagsWriteRepo};
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugAsyncError, SlugError, allocate_unique_slug, derive_slug};
use crate::domain::tags::normalize_tag_names;

/// Create attempts per tag before a slug conflict is reported.
const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum TagResolveError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Maps free-text tag names to tag ids, creating tags on first use.
#[derive(Clone)]
pub struct TagResolver {
    reader: Arc<dyn TagsRepo>,
    writer: Arc<dyn TagsWriteRepo>,
}

impl TagResolver {
    pub fn new(reader: Arc<dyn TagsRepo>, writer: Arc<dyn TagsWriteRepo>) -> Self {
        Self { reader, writer }
    }

    /// Resolve raw names to a de-duplicated set of tag ids.
    ///
    /// The count limit is checked before any lookup. Distinct names are
    /// resolved concurrently.
    pub async fn resolve<S: AsRef<str>>(&self, raw: &[S]) -> Result<BTreeSet<Uuid>, TagResolveError> {
        let names = normalize_tag_names(raw)?;
        self.resolve_normalized(&names).await
    }

    /// Resolve names already passed through [`normalize_tag_names`].
    pub async fn resolve_normalized(
        &self,
        names: &BTreeSet<String>,
    ) -> Result<BTreeSet<Uuid>, TagResolveError> {
        let ids = try_join_all(names.iter().map(|name| self.resolve_one(name))).await?;
        Ok(ids.into_iter().collect())
    }

    async fn resolve_one(&self, name: &str) -> Result<Uuid, TagResolveError> {
        if let Some(tag) = self.reader.find_by_normalized_name(name).await? {
            return Ok(tag.id);
        }

        let mut slug = derive_slug(name).map_err(|err| unrepresentable(name, err))?;
        let mut last_conflict = None;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let params = CreateTagParams {
                slug: slug.clone(),
                name: name.to_string(),
            };

            match self.writer.create_tag(params).await {
                Ok(tag) => {
                    debug!(tag = %tag.name, tag_id = %tag.id, slug = %tag.slug, "Created tag");
                    return Ok(tag.id);
                }
                Err(RepoError::Duplicate { constraint }) => {
                    if let Some(tag) = self.reader.find_by_normalized_name(name).await? {
                        counter!("inkpress_tag_create_races_total").increment(1);
                        debug!(tag = name, constraint = %constraint, "Tag created concurrently, re-fetched");
                        return Ok(tag.id);
                    }
                    // Another name derived the same slug.
                    debug!(tag = name, slug = %slug, "Tag slug taken, allocating a suffix");
                    slug = self.free_slug(name).await?;
                    last_conflict = Some(constraint);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let constraint = last_conflict.unwrap_or_else(|| "tags_slug_key".to_string());
        warn!(tag = name, constraint = %constraint, "Gave up creating tag");
        Err(RepoError::Duplicate { constraint }.into())
    }

    async fn free_slug(&self, name: &str) -> Result<String, TagResolveError> {
        let reader = self.reader.clone();
        allocate_unique_slug(name, move |candidate| {
            let reader = reader.clone();
            async move { Ok::<bool, RepoError>(reader.find_by_slug(&candidate).await?.is_some()) }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Slug(err) => unrepresentable(name, err).into(),
            SlugAsyncError::Lookup(err) => err.into(),
        })
    }
}

fn unrepresentable(name: &str, err: SlugError) -> DomainError {
    DomainError::validation("tags", format!("tag `{name}` is not representable: {err}"))
}
