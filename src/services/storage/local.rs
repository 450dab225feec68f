use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use super::BlobStore;

/// Writes blobs under a directory that the server also serves at `/uploads`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<String> {
        let relative = Path::new(path);
        anyhow::ensure!(
            relative
                .components()
                .all(|c| matches!(c, Component::Normal(_))),
            "invalid blob path: {path}"
        );

        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;

        tracing::debug!(path = %path, "stored blob locally");
        Ok(format!("{}/uploads/{path}", self.public_base_url))
    }
}
