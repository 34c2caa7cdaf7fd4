//! Error types for remote services

use thiserror::Error;

/// Errors that can occur while uploading an image
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload service not configured: {0}")]
    MissingConfiguration(String),
    #[error("Upload preset rejected: {0}")]
    InvalidPreset(String),
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("Upload response missing secure_url")]
    MalformedResponse,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::MissingConfiguration(_) => {
                "Image uploads are not configured. Add a Cloudinary cloud name and upload preset."
                    .to_string()
            }
            UploadError::InvalidPreset(_) => {
                "Invalid Cloudinary Preset. Make sure it is set to 'Unsigned' in your Cloudinary settings."
                    .to_string()
            }
            UploadError::Rejected(message) => message.clone(),
            UploadError::MalformedResponse | UploadError::Http(_) | UploadError::Io(_) => {
                "Failed to upload image.".to_string()
            }
        }
    }
}

/// Errors from the generative text service
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation service not configured")]
    NotConfigured,
    #[error("Generation API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
