use std::error::Error as StdError;

use inkpress_api_types::{Failure, FailureKind};
use thiserror::Error;

use crate::{
    application::{
        images::ImageError, render::RenderError, repos::RepoError, storage::BlobStoreError,
        tags::TagResolveError,
    },
    domain::{
        error::DomainError,
        slug::{SlugAsyncError, SlugError},
    },
    infra::error::InfraError,
};

/// Flattened error chain, kept for logs only.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn joined(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Domain(DomainError::validation(field, message))
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::Domain(DomainError::not_found(entity))
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Domain(DomainError::Validation { .. }) => FailureKind::Validation,
            AppError::Domain(DomainError::NotFound { .. }) => FailureKind::NotFound,
            AppError::Unauthorized(_) => FailureKind::Unauthorized,
            AppError::Upload(_) => FailureKind::Upload,
            AppError::Storage(_) | AppError::Infra(InfraError::Database { .. }) => {
                FailureKind::Storage
            }
            AppError::Infra(_) | AppError::Unexpected(_) => FailureKind::Internal,
        }
    }

    /// Message safe to show to the caller. Validation and not-found errors
    /// carry their own text; everything else is reduced to a fixed phrase.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Domain(err @ DomainError::Validation { .. })
            | AppError::Domain(err @ DomainError::NotFound { .. }) => err.to_string(),
            AppError::Unauthorized(reason) => reason.clone(),
            AppError::Upload(_) => "Image upload failed".to_string(),
            AppError::Storage(_) | AppError::Infra(InfraError::Database { .. }) => {
                "Storage temporarily unavailable".to_string()
            }
            AppError::Infra(InfraError::Configuration { .. }) => {
                "Service misconfigured".to_string()
            }
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }

    pub fn failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.public_message(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound => AppError::not_found("record"),
            RepoError::InvalidInput { message } => AppError::unexpected(message),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<BlobStoreError> for AppError {
    fn from(error: BlobStoreError) -> Self {
        AppError::Upload(error.to_string())
    }
}

impl From<SlugError> for AppError {
    fn from(error: SlugError) -> Self {
        AppError::validation("title", error.to_string())
    }
}

impl From<SlugAsyncError<RepoError>> for AppError {
    fn from(error: SlugAsyncError<RepoError>) -> Self {
        match error {
            SlugAsyncError::Slug(err) => err.into(),
            SlugAsyncError::Lookup(err) => err.into(),
        }
    }
}

impl From<TagResolveError> for AppError {
    fn from(error: TagResolveError) -> Self {
        match error {
            TagResolveError::Domain(err) => err.into(),
            TagResolveError::Repo(err) => err.into(),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(error: RenderError) -> Self {
        AppError::Unexpected(error.to_string())
    }
}

impl From<ImageError> for AppError {
    fn from(error: ImageError) -> Self {
        match error {
            ImageError::Invalid(err) => err.into(),
            ImageError::Upload(err) => err.into(),
        }
    }
}
