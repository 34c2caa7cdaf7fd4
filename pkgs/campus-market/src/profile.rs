//! Registration and profile documents

use campus_auth::{Session, MIN_PASSWORD_LENGTH};
use chrono::{DateTime, Utc};

use crate::display::{default_avatar, joined_label};
use crate::models::User;
use crate::MarketError;

pub const USERS: &str = "users";

/// Two-step sign-up form: account details, then student profile
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub university: String,
    pub department: String,
    pub state: String,
    pub about: String,
}

impl RegistrationForm {
    /// Checks for the first step; the second step's fields are optional
    pub fn validate_account_step(&self) -> Result<(), MarketError> {
        if [&self.full_name, &self.email, &self.phone, &self.password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(MarketError::validation("Please fill in all fields."));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(MarketError::validation(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }

    /// Profile document for a freshly created account
    pub fn profile(&self, uid: &str, now: DateTime<Utc>) -> User {
        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        User {
            id: uid.to_string(),
            name: self.full_name.trim().to_string(),
            avatar: default_avatar(&self.full_name),
            is_verified: false,
            rating: 0.0,
            joined_date: joined_label(now),
            location: self.state.trim().to_string(),
            university: optional(&self.university),
            department: optional(&self.department),
            bio: optional(&self.about),
            phone: optional(&self.phone),
            email: optional(&self.email),
            state: optional(&self.state),
        }
    }
}

/// Profile used when a signed-in account has no `users/{uid}` document
pub fn fallback_profile(session: &Session) -> User {
    User {
        id: session.uid.clone(),
        name: "User".to_string(),
        avatar: String::new(),
        is_verified: false,
        rating: 0.0,
        joined_date: "Just now".to_string(),
        location: String::new(),
        university: None,
        department: None,
        bio: None,
        phone: None,
        email: Some(session.email.clone()),
        state: None,
    }
}
