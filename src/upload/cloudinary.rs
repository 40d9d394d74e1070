//! Cloudinary signed uploads.
//!
//! Requests are signed with SHA-256, which the Cloudinary account must be
//! set to accept.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{sanitize_folder, FileStorage, UploadError, UploadedFile};
use crate::core::CloudinaryConfig;

/// Uploads to Cloudinary's REST upload API.
pub struct CloudinaryStorage {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl CloudinaryStorage {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
        })
    }

    /// Create from configuration; every credential must be present.
    pub fn from_config(config: &CloudinaryConfig) -> Result<Self, UploadError> {
        let cloud_name =
            config.cloud_name.as_deref().ok_or(UploadError::NotConfigured("cloud_name"))?;
        let api_key = config.api_key.as_deref().ok_or(UploadError::NotConfigured("api_key"))?;
        let api_secret =
            config.api_secret.as_deref().ok_or(UploadError::NotConfigured("api_secret"))?;
        Self::new(cloud_name, api_key, api_secret, Duration::from_secs(config.timeout_secs.max(1)))
    }

    /// Create with a custom API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/auto/upload", self.base_url, self.cloud_name)
    }
}

/// Sign upload parameters: `k1=v1&k2=v2...` in key order, followed by the
/// API secret, hashed with SHA-256 and hex encoded.
pub fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let joined = params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    url: String,
    #[serde(default)]
    bytes: u64,
    resource_type: String,
    format: Option<String>,
}

#[async_trait]
impl FileStorage for CloudinaryStorage {
    fn name(&self) -> &str {
        "cloudinary"
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

        let mut params = BTreeMap::new();
        params.insert("folder", sanitize_folder(folder));
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = sign(&params, &self.api_secret);

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("api_key", self.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self.client.post(self.endpoint()).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, "Cloudinary upload failed");
            return Err(UploadError::Provider { status, body });
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::info!(
            public_id = %uploaded.public_id,
            bytes = uploaded.bytes,
            "Uploaded to Cloudinary"
        );

        Ok(UploadedFile {
            public_id: uploaded.public_id,
            secure_url: uploaded.secure_url,
            url: uploaded.url,
            bytes: uploaded.bytes,
            resource_type: uploaded.resource_type,
            format: uploaded.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_sorted_and_salted() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("folder", "evidence".to_string());

        let signature = sign(&params, "abcd");

        let mut hasher = Sha256::new();
        hasher.update(b"folder=evidence&timestamp=1315060510abcd");
        assert_eq!(signature, hex::encode(hasher.finalize()));
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_endpoint() {
        let storage = CloudinaryStorage::new("demo", "key", "secret", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9000/v1_1/");
        assert_eq!(storage.endpoint(), "http://localhost:9000/v1_1/demo/auto/upload");
    }

    #[test]
    fn test_from_config_reports_missing_field() {
        let config = CloudinaryConfig {
            cloud_name: Some("demo".to_string()),
            api_key: Some("key".to_string()),
            ..CloudinaryConfig::default()
        };
        match CloudinaryStorage::from_config(&config) {
            Err(UploadError::NotConfigured(field)) => assert_eq!(field, "api_secret"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
