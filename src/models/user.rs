use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::UserId;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    // Проверить пароль по bcrypt-хешу
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

/// A user ready to be stored; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

impl NewUser {
    pub fn with_password(
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        full_name: impl Into<String>,
        cost: u32,
    ) -> Result<Self, bcrypt::BcryptError> {
        Ok(Self {
            username: username.into(),
            email: email.into(),
            password_hash: bcrypt::hash(password, cost)?,
            full_name: full_name.into(),
        })
    }
}
