pub mod http;
pub mod local;

use async_trait::async_trait;

use crate::errors::AppError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the public URL.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
}

/// Which kind of upload a file is for; decides the allowed content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    IdProof,
    PaymentScreenshot,
    PropertyImage,
    PropertyVideo,
}

impl UploadKind {
    fn allowed(&self) -> &'static [(&'static str, &'static str)] {
        const IMAGES: &[(&str, &str)] = &[
            ("image/jpeg", "jpg"),
            ("image/png", "png"),
            ("image/webp", "webp"),
        ];
        const DOCUMENTS: &[(&str, &str)] = &[
            ("image/jpeg", "jpg"),
            ("image/png", "png"),
            ("image/webp", "webp"),
            ("application/pdf", "pdf"),
        ];
        const VIDEOS: &[(&str, &str)] = &[
            ("video/mp4", "mp4"),
            ("video/webm", "webm"),
            ("video/quicktime", "mov"),
        ];
        match self {
            UploadKind::IdProof => DOCUMENTS,
            UploadKind::PaymentScreenshot | UploadKind::PropertyImage => IMAGES,
            UploadKind::PropertyVideo => VIDEOS,
        }
    }
}

/// One file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Checks type and size and returns the file extension to store it under.
    pub fn validate(&self, kind: UploadKind, max_bytes: usize) -> Result<&'static str, AppError> {
        if self.bytes.is_empty() {
            return Err(AppError::validation(&self.field, "file is empty"));
        }
        if self.bytes.len() > max_bytes {
            return Err(AppError::validation(
                &self.field,
                format!("file exceeds {max_bytes} bytes"),
            ));
        }
        let content_type = self.content_type.to_ascii_lowercase();
        kind.allowed()
            .iter()
            .find(|(ct, _)| *ct == content_type)
            .map(|(_, ext)| *ext)
            .ok_or_else(|| {
                AppError::validation(
                    &self.field,
                    format!("unsupported file type: {}", self.content_type),
                )
            })
    }
}

/// Validates and stores `uploads` under `prefix/`, returning URLs in order.
/// Every file is checked before the first one is written.
pub async fn store_all(
    blobs: &dyn BlobStore,
    prefix: &str,
    kind: UploadKind,
    uploads: Vec<Upload>,
    max_bytes: usize,
) -> Result<Vec<String>, AppError> {
    let mut checked = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let ext = upload.validate(kind, max_bytes)?;
        checked.push((upload, ext));
    }

    let mut urls = Vec::with_capacity(checked.len());
    for (upload, ext) in checked {
        let path = format!("{prefix}/{}.{ext}", uuid::Uuid::new_v4());
        let url = blobs
            .put(&path, upload.bytes, &upload.content_type)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, path = %path, "blob upload failed");
                AppError::Storage(e.to_string())
            })?;
        urls.push(url);
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> Upload {
        Upload {
            field: "files".to_string(),
            file_name: Some("a".to_string()),
            content_type: content_type.to_string(),
            bytes: vec![1; len],
        }
    }

    #[test]
    fn test_id_proof_accepts_pdf() {
        assert_eq!(
            upload("application/pdf", 10)
                .validate(UploadKind::IdProof, 100)
                .unwrap(),
            "pdf"
        );
        assert_eq!(upload("IMAGE/PNG", 10).validate(UploadKind::IdProof, 100).unwrap(), "png");
    }

    #[test]
    fn test_screenshot_rejects_pdf() {
        assert!(upload("application/pdf", 10)
            .validate(UploadKind::PaymentScreenshot, 100)
            .is_err());
    }

    #[test]
    fn test_size_limits() {
        assert!(upload("image/png", 0).validate(UploadKind::PropertyImage, 100).is_err());
        assert!(upload("image/png", 101).validate(UploadKind::PropertyImage, 100).is_err());
        assert!(upload("video/mp4", 100).validate(UploadKind::PropertyVideo, 100).is_ok());
    }
}
