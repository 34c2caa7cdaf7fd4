//! Authentication manager for handling user accounts and sessions

use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::{accounts, password_resets};
use crate::AuthError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Consecutive failures before sign-in is refused for an email
const MAX_FAILED_ATTEMPTS: u32 = 5;

const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Authenticated session identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Issued password reset, to be delivered to the account's email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordReset {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authentication manager
pub struct AuthManager {
    db: DatabaseConnection,
    state: watch::Sender<Option<Session>>,
    failed_attempts: Mutex<HashMap<String, u32>>,
}

impl AuthManager {
    /// Open (or create) the account database at `db_path`
    pub async fn open(db_path: PathBuf) -> anyhow::Result<Self> {
        let db_path_str = db_path
            .to_str()
            .context("Invalid database path")?
            .replace("\\", "/");

        let db_url = format!("sqlite:{}?mode=rwc", db_path_str);
        let db = Database::connect(db_url.as_str())
            .await
            .context("Failed to connect to database")?;

        let manager = Self::with_connection(db).await?;
        info!("Auth manager initialized at {}", db_path.display());
        Ok(manager)
    }

    /// Create an auth manager with an existing database connection
    pub async fn with_connection(db: DatabaseConnection) -> anyhow::Result<Self> {
        crate::migration::Migrator::up(&db, None)
            .await
            .context("Failed to run migrations")?;

        let (state, _) = watch::channel(None);

        Ok(Self {
            db,
            state,
            failed_attempts: Mutex::new(HashMap::new()),
        })
    }

    /// Receive every sign-in and sign-out. The current value is available
    /// immediately through `borrow()`.
    pub fn on_auth_state_changed(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// Create an account and sign it in
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyInUse(email));
        }

        let uid = Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        let account = accounts::ActiveModel {
            uid: Set(uid.clone()),
            email: Set(email.clone()),
            password_hash: Set(hash_password(password)?),
            created_at: Set(now.timestamp_millis()),
            last_sign_in_at: Set(Some(now.timestamp_millis())),
        };
        account.insert(&self.db).await?;

        info!("Account created for uid: {}", uid);

        let session = Session {
            uid,
            email,
            signed_in_at: now,
        };
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;

        {
            let attempts = self.failed_attempts.lock().await;
            if attempts.get(&email).copied().unwrap_or(0) >= MAX_FAILED_ATTEMPTS {
                warn!("Sign-in throttled for {}", email);
                return Err(AuthError::TooManyRequests);
            }
        }

        let account = match self.find_by_email(&email).await? {
            Some(account) if verify_password(password, &account.password_hash) => account,
            _ => {
                let mut attempts = self.failed_attempts.lock().await;
                *attempts.entry(email.clone()).or_insert(0) += 1;
                warn!("Sign-in failed for {}", email);
                return Err(AuthError::InvalidCredential);
            }
        };

        self.failed_attempts.lock().await.remove(&email);

        let now = Utc::now();
        let uid = account.uid.clone();
        let mut active: accounts::ActiveModel = account.into();
        active.last_sign_in_at = Set(Some(now.timestamp_millis()));
        active.update(&self.db).await?;

        info!("Sign-in successful for uid: {}", uid);

        let session = Session {
            uid,
            email,
            signed_in_at: now,
        };
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if let Some(session) = self.state.send_replace(None) {
            info!("Signed out uid: {}", session.uid);
        }
    }

    /// Issue a password reset token for `email`
    pub async fn send_password_reset(&self, email: &str) -> Result<PasswordReset, AuthError> {
        let email = normalize_email(email)?;
        let account = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(email.clone()))?;

        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

        let reset = password_resets::ActiveModel {
            token_digest: Set(digest_token(&token)),
            uid: Set(account.uid),
            expires_at: Set(expires_at.timestamp_millis()),
            created_at: Set(now.timestamp_millis()),
        };
        reset.insert(&self.db).await?;

        info!("Password reset issued for {}", email);

        Ok(PasswordReset {
            email,
            token,
            expires_at,
        })
    }

    /// Consume a reset token and set a new password
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
        }

        let reset = password_resets::Entity::find_by_id(digest_token(token))
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        // Single use, expired or not
        password_resets::Entity::delete_by_id(reset.token_digest.clone())
            .exec(&self.db)
            .await?;

        if reset.expires_at < Utc::now().timestamp_millis() {
            debug!("Expired reset token for uid: {}", reset.uid);
            return Err(AuthError::InvalidResetToken);
        }

        let account = accounts::Entity::find_by_id(reset.uid.clone())
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let email = account.email.clone();
        let mut active: accounts::ActiveModel = account.into();
        active.password_hash = Set(hash_password(new_password)?);
        active.update(&self.db).await?;

        self.failed_attempts.lock().await.remove(&email);
        info!("Password reset completed for uid: {}", reset.uid);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<accounts::Model>, AuthError> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }
}

/// Trim, lowercase and sanity-check an email address
fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::PasswordHash(err.to_string()))
}

fn verify_password(candidate: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
