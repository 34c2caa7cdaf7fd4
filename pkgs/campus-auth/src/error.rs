//! Error types for authentication

use sea_orm::DbErr;
use thiserror::Error;

/// Errors returned by the auth provider
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredential,
    #[error("No account for email: {0}")]
    UserNotFound(String),
    #[error("Email already in use: {0}")]
    EmailAlreadyInUse(String),
    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("Invalid email: {0}")]
    InvalidEmail(String),
    #[error("Too many failed sign-in attempts")]
    TooManyRequests,
    #[error("Password reset token is invalid or expired")]
    InvalidResetToken,
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AuthError {
    /// Short text suitable for showing to the person signing in
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredential | AuthError::UserNotFound(_) => {
                "Invalid email or password. Please try again.".to_string()
            }
            AuthError::EmailAlreadyInUse(_) => {
                "This email is already registered. Please login instead.".to_string()
            }
            AuthError::WeakPassword(min) => format!(
                "Password is too weak. It must be at least {} characters.",
                min
            ),
            AuthError::InvalidEmail(_) => "The email address is badly formatted.".to_string(),
            AuthError::TooManyRequests => {
                "Too many failed attempts. Please try again later.".to_string()
            }
            AuthError::InvalidResetToken => {
                "This reset link is invalid or has expired.".to_string()
            }
            AuthError::PasswordHash(_) | AuthError::Database(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
        }
    }
}
