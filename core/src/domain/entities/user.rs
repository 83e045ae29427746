//! User entity representing a registered account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vouch_shared::utils::validation::{is_valid_email, normalize_email};

use crate::errors::DomainError;

/// Maximum length of a full name
pub const MAX_FULLNAME_LENGTH: usize = 100;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt ignores input past 72 bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// User entity representing a registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user
    pub id: Uuid,

    pub fullname: String,

    /// Normalized (trimmed, lowercase) email address
    pub email: String,

    /// bcrypt hash of the password
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Whether the email address has been proven
    pub is_verified: bool,

    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the user was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new, unverified user
    pub fn new(fullname: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            fullname,
            email,
            password_hash,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the user as verified
    pub fn verify(&mut self) {
        self.is_verified = true;
        self.updated_at = Utc::now();
    }
}

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub fullname: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn new(
        fullname: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            fullname: fullname.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check the fields and return a copy with the email normalized
    pub fn validated(&self) -> Result<NewUser, DomainError> {
        let fullname = self.fullname.trim();
        if fullname.is_empty() {
            return Err(DomainError::validation("fullname is required"));
        }
        if fullname.chars().count() > MAX_FULLNAME_LENGTH {
            return Err(DomainError::validation(format!(
                "fullname must be at most {} characters",
                MAX_FULLNAME_LENGTH
            )));
        }

        let email = normalize_email(&self.email);
        if !is_valid_email(&email) {
            return Err(DomainError::validation("email format is invalid"));
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.password.len() > MAX_PASSWORD_BYTES {
            return Err(DomainError::validation(format!(
                "password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        Ok(NewUser {
            fullname: fullname.to_string(),
            email,
            password: self.password.clone(),
        })
    }
}
