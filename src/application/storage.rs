//! Remote object storage boundary for cover images.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob store request failed: {0}")]
    Request(String),
    #[error("blob store responded with status {status}")]
    Status { status: u16 },
    #[error("invalid blob url `{url}`")]
    InvalidUrl { url: String },
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `key` and return the public URL.
    async fn put(&self, key: &str, body: Bytes) -> Result<String, BlobStoreError>;

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;
}
