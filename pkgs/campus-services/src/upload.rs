//! Unsigned image upload

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, error, info};
use url::Url;

use crate::UploadError;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/";

/// Cloudinary account settings. The preset must be configured as unsigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    pub api_base: String,
}

impl UploadConfig {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Upload endpoint for this cloud
    pub fn endpoint(&self) -> Result<Url, UploadError> {
        if self.cloud_name.trim().is_empty() {
            return Err(UploadError::MissingConfiguration("cloud_name".into()));
        }
        if self.upload_preset.trim().is_empty() {
            return Err(UploadError::MissingConfiguration("upload_preset".into()));
        }

        let base = Url::parse(&self.api_base)
            .map_err(|e| UploadError::MissingConfiguration(format!("api_base: {}", e)))?;
        base.join(&format!("v1_1/{}/image/upload", self.cloud_name))
            .map_err(|e| UploadError::MissingConfiguration(format!("cloud_name: {}", e)))
    }
}

/// An image picked for upload
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();

        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self::from_bytes(file_name, bytes))
    }
}

/// Object upload service: one file in, one public URL out
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, file: &ImageFile) -> Result<String, UploadError>;
}

/// Cloudinary unsigned upload client
pub struct CloudinaryUploader {
    client: reqwest::Client,
    endpoint: Url,
    upload_preset: String,
}

impl CloudinaryUploader {
    /// Fails with `MissingConfiguration` when the cloud name or preset is blank
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let endpoint = config.endpoint()?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            upload_preset: config.upload_preset,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ImageUploader for CloudinaryUploader {
    async fn upload(&self, file: &ImageFile) -> Result<String, UploadError> {
        debug!(
            "Uploading {} ({} bytes, {})",
            file.file_name,
            file.bytes.len(),
            file.content_type
        );

        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("Upload failed");
            error!("Upload of {} failed ({}): {}", file.file_name, status, message);
            return Err(classify_rejection(message));
        }

        let url = secure_url(&body)?;
        info!("Uploaded {} to {}", file.file_name, url);
        Ok(url)
    }
}

/// Map a service error message to an upload error
pub(crate) fn classify_rejection(message: &str) -> UploadError {
    if message.to_lowercase().contains("preset") {
        UploadError::InvalidPreset(message.to_string())
    } else {
        UploadError::Rejected(message.to_string())
    }
}

pub(crate) fn secure_url(body: &Value) -> Result<String, UploadError> {
    body.get("secure_url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(UploadError::MalformedResponse)
}
