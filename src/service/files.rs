//! Evidence file uploads.

use super::{ServiceError, ServiceResult};
use crate::app::App;
use crate::core::Actor;
use crate::upload::{UploadError, UploadedFile};

/// A file received from a client.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Target folder; the configured folder when absent
    pub folder: Option<String>,
}

impl App {
    /// Store an evidence file and describe where it ended up.
    pub async fn upload_file(
        &self,
        actor: &Actor,
        request: UploadRequest,
    ) -> ServiceResult<UploadedFile> {
        let UploadRequest { filename, bytes, folder } = request;
        if bytes.is_empty() {
            return Err(ServiceError::Validation(UploadError::EmptyFile.to_string()));
        }
        let folder = folder
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.config.storage.cloudinary.folder.clone());
        let filename = if filename.trim().is_empty() { "upload" } else { filename.as_str() };

        let file = self.files.upload(bytes, filename, &folder).await?;
        tracing::info!(
            user = %actor.id,
            backend = self.files.name(),
            public_id = %file.public_id,
            "File uploaded"
        );
        Ok(file)
    }
}
