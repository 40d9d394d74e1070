//! Evidence file storage.
//!
//! Files are uploaded before evidence is submitted; the resulting URL and
//! public id are then sent with the evidence record.

mod cloudinary;
mod local;

pub use cloudinary::CloudinaryStorage;
pub use local::LocalStorage;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::{StorageBackend, StorageConfig};

/// A stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub public_id: String,
    pub secure_url: String,
    pub url: String,
    pub bytes: u64,
    /// `image`, `video` or `raw`
    pub resource_type: String,
    pub format: Option<String>,
}

/// Upload errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File storage is not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("No file provided")]
    EmptyFile,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage provider error ({status}): {body}")]
    Provider { status: u16, body: String },
}

/// A place evidence files can be uploaded to.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &str;

    /// Store `bytes` under `folder` and describe where it ended up.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: &str,
    ) -> Result<UploadedFile, UploadError>;
}

/// Build the configured storage backend.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn FileStorage>, UploadError> {
    let storage: Arc<dyn FileStorage> = match config.backend {
        StorageBackend::Local => Arc::new(LocalStorage::from_config(&config.local)),
        StorageBackend::Cloudinary => {
            Arc::new(CloudinaryStorage::from_config(&config.cloudinary)?)
        }
    };
    Ok(storage)
}

/// Coarse resource type derived from a file extension.
pub fn resource_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp") => "image",
        Some("mp4" | "mov" | "webm" | "avi" | "mkv") => "video",
        _ => "raw",
    }
}

/// Lower-cased extension of `filename`, if any.
pub fn extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Replace anything but ASCII alphanumerics, `.`, `-` and `_`.
pub(crate) fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    cleaned.trim_matches('.').to_string()
}

/// Sanitize a `/`-separated folder, dropping empty and dot segments.
pub(crate) fn sanitize_folder(folder: &str) -> String {
    folder
        .split('/')
        .map(sanitize_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type() {
        assert_eq!(resource_type("shot.PNG"), "image");
        assert_eq!(resource_type("demo.mp4"), "video");
        assert_eq!(resource_type("report.pdf"), "raw");
        assert_eq!(resource_type("README"), "raw");
    }

    #[test]
    fn test_sanitize_folder_drops_traversal() {
        assert_eq!(sanitize_folder("../../etc"), "etc");
        assert_eq!(sanitize_folder("evidence/task 1"), "evidence/task_1");
        assert_eq!(sanitize_folder("/"), "");
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("my report (final).pdf"), "my_report__final_.pdf");
        assert_eq!(sanitize_segment(".."), "");
    }

    #[test]
    fn test_cloudinary_backend_requires_credentials() {
        let mut config = StorageConfig::default();
        config.backend = StorageBackend::Cloudinary;
        assert!(matches!(from_config(&config), Err(UploadError::NotConfigured(_))));
    }
}
