// src/services/auth.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use validator::ValidateEmail;

use crate::{
    error::AppError,
    models::user::{AuthResponse, NewUser, User, UserView},
    storage::UserStore,
    utils::{
        hash::{
            DUMMY_PASSWORD_HASH, hash_password_blocking, random_token, verify_password_blocking,
        },
        jwt::{Claims, TokenCodec, UserSnapshot, bearer_token},
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;
const RESET_TOKEN_BYTES: usize = 16;
const RESET_TOKEN_TTL_HOURS: i64 = 24;

/// Registration, login and session verification.
///
/// Each user has at most one live session: the last issued token is stored on
/// the user record and any other token, however well signed, is rejected.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    codec: TokenCodec,
    token_ttl: u64,
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(AppError::InvalidEmail);
    }
    Ok(email)
}

fn check_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::WeakPassword);
    }
    Ok(())
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, codec: TokenCodec, token_ttl: u64) -> Self {
        Self {
            users,
            codec,
            token_ttl,
        }
    }

    /// Signs a fresh token for `user` and makes it the only valid session.
    async fn open_session(&self, user: User) -> Result<AuthResponse, AppError> {
        let claims = Claims::new(
            user.id,
            Some(UserSnapshot {
                email: user.email.clone(),
                display_name: user.display_name.clone(),
            }),
            self.token_ttl,
        );
        let token = self.codec.encode(&claims)?;
        let now = Utc::now();

        if !self.users.start_session(user.id, &token, now).await? {
            return Err(AppError::PersistenceFailure(format!(
                "session for user {} was not stored",
                user.id
            )));
        }

        let mut view = UserView::from(user);
        view.last_login_at = Some(now);
        Ok(AuthResponse { user: view, token })
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        photo_url: Option<String>,
    ) -> Result<AuthResponse, AppError> {
        let email = normalize_email(email)?;
        check_strength(password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let user = self
            .users
            .insert(NewUser {
                email,
                password_hash,
                display_name: display_name.trim().to_string(),
                photo_url,
                is_admin: false,
                is_founder: false,
            })
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        self.open_session(user).await
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let email = normalize_email(email)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::debug!("login attempt for unknown email");
            verify_password_blocking(password.to_string(), DUMMY_PASSWORD_HASH.to_string())
                .await?;
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password_blocking(password.to_string(), user.password.clone()).await? {
            tracing::debug!(user_id = user.id, "login attempt with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = user.id, "user logged in");
        self.open_session(user).await
    }

    /// Resolves an `Authorization` header value to the session's user.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<UserView, AppError> {
        let token = bearer_token(authorization)?;
        let claims: Claims = self.codec.decode(token)?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if user.auth_token.as_deref() != Some(token) {
            return Err(AppError::SessionInvalid);
        }

        Ok(UserView::from(user))
    }

    pub async fn require_admin(&self, authorization: Option<&str>) -> Result<UserView, AppError> {
        let user = self.verify(authorization).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(user)
    }

    pub async fn require_founder(&self, authorization: Option<&str>) -> Result<UserView, AppError> {
        let user = self.verify(authorization).await?;
        if !user.is_founder {
            return Err(AppError::Forbidden);
        }
        Ok(user)
    }

    /// Idempotent.
    pub async fn logout(&self, user_id: i64) -> Result<(), AppError> {
        if !self.users.clear_session(user_id).await? {
            return Err(AppError::UserNotFound);
        }
        tracing::info!(user_id, "user logged out");
        Ok(())
    }

    /// Issues a reset token valid for 24 hours and returns it.
    ///
    /// There is no mail delivery; the token is only logged.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, AppError> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AppError::EmailNotFound)?;

        let token = random_token(RESET_TOKEN_BYTES);
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        if !self.users.set_reset_token(user.id, &token, expires_at).await? {
            return Err(AppError::UserNotFound);
        }

        tracing::info!(user_id = user.id, %expires_at, "password reset requested");
        tracing::debug!(user_id = user.id, reset_token = %token, "password reset token issued");
        Ok(token)
    }

    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<(), AppError> {
        let user = self
            .users
            .find_by_reset_token(reset_token)
            .await?
            .ok_or(AppError::InvalidResetToken)?;

        match user.reset_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => return Err(AppError::TokenExpired),
        }
        check_strength(new_password)?;

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        if !self
            .users
            .consume_reset_token(reset_token, &password_hash, Utc::now())
            .await?
        {
            // Another reset used the token after the lookup above.
            tracing::warn!(user_id = user.id, "reset token consumed concurrently");
            return Err(AppError::InvalidResetToken);
        }
        tracing::info!(user_id = user.id, "password reset completed");
        Ok(())
    }

    pub async fn update_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if !verify_password_blocking(current_password.to_string(), user.password).await? {
            return Err(AppError::InvalidCredentials);
        }
        check_strength(new_password)?;

        let password_hash = hash_password_blocking(new_password.to_string()).await?;
        if !self.users.set_password(user_id, &password_hash).await? {
            return Err(AppError::UserNotFound);
        }
        tracing::info!(user_id, "password changed");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserView>, AppError> {
        Ok(self
            .users
            .list_users()
            .await?
            .into_iter()
            .map(UserView::from)
            .collect())
    }

    pub async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<UserView, AppError> {
        if !self.users.set_admin(user_id, is_admin).await? {
            return Err(AppError::UserNotFound);
        }
        tracing::info!(user_id, is_admin, "admin flag changed");
        self.users
            .find_by_id(user_id)
            .await?
            .map(UserView::from)
            .ok_or(AppError::UserNotFound)
    }

    /// Creates the founding admin account unless the email is already registered.
    /// Returns whether an account was created.
    pub async fn seed_founder(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<bool, AppError> {
        let email = normalize_email(email)?;
        check_strength(password)?;
        if self.users.find_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        tracing::info!("Seeding founder account: {}", email);
        let password_hash = hash_password_blocking(password.to_string()).await?;
        self.users
            .insert(NewUser {
                email,
                password_hash,
                display_name: display_name.to_string(),
                photo_url: None,
                is_admin: true,
                is_founder: true,
            })
            .await?;
        Ok(true)
    }
}
