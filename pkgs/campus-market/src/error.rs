//! Error types for the marketplace client

use campus_auth::AuthError;
use campus_services::{GenerationError, UploadError};
use campus_store::StoreError;
use thiserror::Error;

/// Errors surfaced by marketplace operations
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Lookup failed: {0}")]
    LookupFailed(#[source] StoreError),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Remote failure: {0}")]
    RemoteFailure(String),
    #[error("Upload failed: {0}")]
    UploadFailed(#[from] UploadError),
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(#[from] GenerationError),
    #[error("Not signed in")]
    NotSignedIn,
    #[error("{0}")]
    Validation(String),
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

impl MarketError {
    pub fn validation(message: impl Into<String>) -> Self {
        MarketError::Validation(message.into())
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, MarketError::PermissionDenied(_))
    }

    /// Short text suitable for a toast or inline form error
    pub fn user_message(&self) -> String {
        match self {
            MarketError::InvalidArgument(msg) => format!("Invalid request: {}", msg),
            MarketError::LookupFailed(_) => {
                "Could not load data. Check your connection.".to_string()
            }
            MarketError::PermissionDenied(_) => {
                "Permission denied: You are not allowed to do that.".to_string()
            }
            MarketError::RemoteFailure(msg) => format!("Action failed: {}", msg),
            MarketError::UploadFailed(e) => e.user_message(),
            MarketError::GenerationUnavailable(_) => {
                "Could not generate description.".to_string()
            }
            MarketError::NotSignedIn => "Please sign in first.".to_string(),
            MarketError::Validation(msg) => msg.clone(),
            MarketError::Auth(e) => e.user_message(),
        }
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => MarketError::PermissionDenied(msg),
            other => MarketError::RemoteFailure(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::RemoteFailure(format!("malformed document: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_classified() {
        let denied: MarketError = StoreError::PermissionDenied("update products/p1".into()).into();
        assert!(denied.is_permission_denied());

        let generic: MarketError = StoreError::Unavailable("offline".into()).into();
        assert!(matches!(generic, MarketError::RemoteFailure(_)));
        assert_ne!(denied.user_message(), generic.user_message());
    }

    #[test]
    fn test_validation_message_is_shown_verbatim() {
        let err = MarketError::validation("Please fill in all fields.");
        assert_eq!(err.user_message(), "Please fill in all fields.");
    }
}
