//! MySQL implementation of the UserRepository trait.
//!
//! Rows live in the `users` table created by the embedded migrations.
//! Emails are stored normalized; the unique index on `email` is the final
//! guard against duplicate registrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

use vouch_core::domain::entities::User;
use vouch_core::errors::{DomainError, OtpError};
use vouch_core::repositories::UserRepository;

const SELECT_USER: &str = r#"
    SELECT id, fullname, email, password_hash, is_verified, created_at, updated_at
    FROM users
"#;

/// MySQL implementation of UserRepository
pub struct MySqlUserRepository {
    /// Database connection pool
    pool: MySqlPool,
}

impl MySqlUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Convert database row to User entity
    fn row_to_user(row: &sqlx::mysql::MySqlRow) -> Result<User, DomainError> {
        let id: String = row.try_get("id").map_err(column_error("id"))?;

        Ok(User {
            id: Uuid::parse_str(&id).map_err(|e| DomainError::Database {
                message: format!("Invalid UUID: {}", e),
            })?,
            fullname: row.try_get("fullname").map_err(column_error("fullname"))?,
            email: row.try_get("email").map_err(column_error("email"))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(column_error("password_hash"))?,
            is_verified: row
                .try_get("is_verified")
                .map_err(column_error("is_verified"))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(column_error("created_at"))?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(column_error("updated_at"))?,
        })
    }
}

fn column_error(column: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::Database {
        message: format!("Failed to get {}: {}", column, e),
    }
}

fn query_error(context: &str, e: sqlx::Error) -> DomainError {
    tracing::error!(error = %e, "{}", context);
    DomainError::Database {
        message: format!("{}: {}", context, e),
    }
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let query = format!("{} WHERE email = ? LIMIT 1", SELECT_USER);

        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Database query failed", e))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn create(&self, user: User) -> Result<Uuid, DomainError> {
        let query = r#"
            INSERT INTO users (
                id, fullname, email, password_hash,
                is_verified, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;

        let result = sqlx::query(query)
            .bind(user.id.to_string())
            .bind(&user.fullname)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_verified)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(user.id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(OtpError::EmailAlreadyRegistered.into())
            }
            Err(e) => Err(query_error("Failed to create user", e)),
        }
    }

    async fn set_verified(&self, email: &str) -> Result<(), DomainError> {
        let query = r#"
            UPDATE users SET
                is_verified = TRUE,
                updated_at = ?
            WHERE email = ?
        "#;

        let result = sqlx::query(query)
            .bind(Utc::now())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to verify user", e))?;

        // MySQL reports changed rows, not matched rows
        if result.rows_affected() == 0 && self.find_by_email(email).await?.is_none() {
            return Err(DomainError::NotFound {
                resource: "User".to_string(),
            });
        }

        Ok(())
    }
}
