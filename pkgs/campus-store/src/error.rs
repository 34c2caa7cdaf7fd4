//! Error types for document store operations

use sea_orm::DbErr;
use thiserror::Error;

use crate::DocPath;

/// Errors that can occur in document store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(DocPath),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid document path: {0}")]
    InvalidPath(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the backend's access rules rejected the call
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
