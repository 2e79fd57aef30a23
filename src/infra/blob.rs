//! HTTP object store adapter (`PUT`/`DELETE <endpoint>/<zone>/<key>`).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, header};
use tracing::debug;
use url::Url;

use crate::application::storage::{BlobStore, BlobStoreError};
use crate::config::StorageSettings;

use super::error::InfraError;

const ACCESS_KEY_HEADER: &str = "AccessKey";

#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    endpoint: Url,
    zone: String,
    access_key: String,
    public_base_url: Url,
}

impl HttpBlobStore {
    pub fn new(settings: &StorageSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("inkpress/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            zone: settings.zone.clone(),
            access_key: settings.access_key.clone(),
            public_base_url: settings.public_base_url.clone(),
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, BlobStoreError> {
        append_segments(&self.endpoint, &[&self.zone, key])
    }

    fn public_url(&self, key: &str) -> Result<Url, BlobStoreError> {
        append_segments(&self.public_base_url, &[key])
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
    ) -> Result<(), BlobStoreError> {
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(ACCESS_KEY_HEADER, &self.access_key);
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| BlobStoreError::Request(err.to_string()))?;

        let status = response.status();
        debug!(%method, %url, status = status.as_u16(), "Blob store responded");
        if !status.is_success() {
            return Err(BlobStoreError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, body: Bytes) -> Result<String, BlobStoreError> {
        let url = self.object_url(key)?;
        self.send(Method::PUT, url, Some(body)).await?;
        Ok(self.public_url(key)?.to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        let url = self.object_url(key)?;
        self.send(Method::DELETE, url, None).await
    }
}

/// Append percent-encoded path segments, ignoring a trailing slash on `base`.
fn append_segments(base: &Url, segments: &[&str]) -> Result<Url, BlobStoreError> {
    let invalid = || BlobStoreError::InvalidUrl {
        url: base.to_string(),
    };
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(invalid());
    }

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
