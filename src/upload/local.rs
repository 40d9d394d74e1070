//! Local directory storage.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{
    extension, resource_type, sanitize_folder, sanitize_segment, FileStorage, UploadError,
    UploadedFile,
};
use crate::core::{new_id, LocalStorageConfig};

/// Writes files under a directory that is served elsewhere under
/// `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LocalStorageConfig) -> Self {
        Self::new(&config.dir, &config.public_base_url)
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: &str,
    ) -> Result<UploadedFile, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        let folder = sanitize_folder(folder);
        let mut name = sanitize_segment(filename);
        if name.is_empty() {
            name = "file".to_string();
        }
        let stored_name = format!("{}-{name}", new_id());

        let target_dir = if folder.is_empty() { self.dir.clone() } else { self.dir.join(&folder) };
        let path = target_dir.join(&stored_name);
        tokio::fs::create_dir_all(&target_dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        let relative =
            if folder.is_empty() { stored_name.clone() } else { format!("{folder}/{stored_name}") };
        let public_id = match relative.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => relative.clone(),
        };
        let url = format!("{}/{relative}", self.public_base_url);

        tracing::info!(path = %path.display(), bytes = bytes.len(), "Stored upload");

        Ok(UploadedFile {
            public_id,
            secure_url: url.clone(),
            url,
            bytes: bytes.len() as u64,
            resource_type: resource_type(filename).to_string(),
            format: extension(filename),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads/");

        let file =
            storage.upload(b"%PDF-1.4".to_vec(), "final report.pdf", "evidence").await.unwrap();

        assert!(file.url.starts_with("/uploads/evidence/"));
        assert!(file.url.ends_with("-final_report.pdf"));
        assert_eq!(file.secure_url, file.url);
        assert!(file.public_id.starts_with("evidence/"));
        assert!(!file.public_id.ends_with(".pdf"));
        assert_eq!(file.bytes, 8);
        assert_eq!(file.resource_type, "raw");
        assert_eq!(file.format.as_deref(), Some("pdf"));

        let stored_name = file.url.trim_start_matches("/uploads/evidence/");
        let content = std::fs::read(dir.path().join("evidence").join(stored_name)).unwrap();
        assert_eq!(content, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads");
        let err = storage.upload(Vec::new(), "a.png", "evidence").await.unwrap_err();
        assert!(matches!(err, UploadError::EmptyFile));
    }

    #[tokio::test]
    async fn test_folder_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let storage = LocalStorage::new(&root, "/uploads");

        let file = storage.upload(b"png".to_vec(), "shot.png", "../outside").await.unwrap();
        assert!(file.url.starts_with("/uploads/outside/"));
        assert!(root.join("outside").is_dir());
        assert!(!dir.path().join("outside").exists());
    }
}
