//! Cover image validation, upload and reclamation.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::storage::{BlobStore, BlobStoreError};
use crate::domain::error::DomainError;
use crate::domain::uploads::{
    ImageBounds, storage_key_for, storage_key_from_url, validate_image_mime,
};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Upload(#[from] BlobStoreError),
}

/// An uploaded image as received from the author.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct ImageIngestor {
    store: Arc<dyn BlobStore>,
    bounds: ImageBounds,
}

impl ImageIngestor {
    pub fn new(store: Arc<dyn BlobStore>, bounds: ImageBounds) -> Self {
        Self { store, bounds }
    }

    /// Checks that need no I/O: the declared type and the pixel dimensions.
    pub fn validate(&self, image: &ImageUpload) -> Result<(), DomainError> {
        validate_image_mime(&image.content_type)?;

        let size = imagesize::blob_size(&image.bytes).map_err(|err| {
            DomainError::validation("cover_image", format!("could not read image dimensions: {err}"))
        })?;
        self.bounds.check(size.width as u64, size.height as u64)
    }

    /// Validate and store the image, returning its public URL.
    ///
    /// A rejected image never reaches the store.
    pub async fn upload(&self, image: &ImageUpload) -> Result<String, ImageError> {
        self.validate(image)?;

        let key = storage_key_for(&image.file_name);
        let url = self.store.put(&key, image.bytes.clone()).await?;
        info!(key = %key, bytes = image.bytes.len(), "Stored cover image");
        Ok(url)
    }

    /// Delete the blob behind `public_url`. Failures are logged and counted,
    /// never returned.
    pub async fn delete(&self, public_url: &str) {
        let Some(key) = storage_key_from_url(public_url) else {
            counter!("inkpress_blob_delete_failures_total").increment(1);
            warn!(url = public_url, "Cannot derive storage key from blob url");
            return;
        };

        match self.store.delete(&key).await {
            Ok(()) => info!(key = %key, "Deleted cover image"),
            Err(err) => {
                counter!("inkpress_blob_delete_failures_total").increment(1);
                warn!(key = %key, error = %err, "Failed to delete cover image");
            }
        }
    }
}
