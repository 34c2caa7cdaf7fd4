//! Authentication and account management for Campus Market
//!
//! This crate provides the auth provider the marketplace client signs in
//! against:
//! - Email/password sign-up and sign-in with Argon2 password hashes
//! - Sign-out and an auth-state channel (`on_auth_state_changed`)
//! - Password reset tokens, stored only as digests
//! - User-facing messages for every auth failure

pub mod auth_manager;
pub mod entities;
pub mod error;
pub mod migration;

pub use auth_manager::{AuthManager, PasswordReset, Session, MIN_PASSWORD_LENGTH};
pub use error::AuthError;
