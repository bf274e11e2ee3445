// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table / collection.
///
/// This is the stored record and carries the password hash and session tokens;
/// anything leaving the service layer goes through [`UserView`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,

    /// Unique, stored trimmed and lower-cased.
    pub email: String,

    /// Argon2 password hash.
    pub password: String,

    pub display_name: String,
    pub photo_url: Option<String>,

    pub is_admin: bool,
    pub is_founder: bool,

    /// The most recently issued JWT. `None` means logged out.
    pub auth_token: Option<String>,

    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Admins and founders may moderate content they did not write.
    pub fn is_moderator(&self) -> bool {
        self.is_admin || self.is_founder
    }
}

/// Public projection of a user (no password, no tokens).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub is_admin: bool,
    pub is_founder: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            is_admin: user.is_admin,
            is_founder: user.is_founder,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Data needed to persist a new user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub is_admin: bool,
    pub is_founder: bool,
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub token: String,
}

/// DTO for registration.
/// Email format and password strength are checked by the auth service so they
/// surface as their own error kinds.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[validate(length(
        min = 1,
        max = 50,
        message = "Display name length must be between 1 and 50 characters."
    ))]
    pub display_name: String,
    #[validate(url(message = "Photo URL must be a valid URL."))]
    pub photo_url: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}
