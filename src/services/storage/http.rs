use anyhow::Context;
use async_trait::async_trait;

use super::BlobStore;

/// Object storage reachable over HTTP: `PUT {bucket_url}/{path}` with a bearer
/// key, public URL is the same address.
pub struct HttpBlobStore {
    bucket_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(bucket_url: String, api_key: String) -> Self {
        Self {
            bucket_url: bucket_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let url = format!("{}/{}", self.bucket_url, path.trim_start_matches('/'));

        self.client
            .put(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("failed to upload blob")?
            .error_for_status()
            .context("object storage returned error")?;

        Ok(url)
    }
}
