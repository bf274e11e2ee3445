// src/utils/jwt.rs

use std::collections::HashSet;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::AppError, models::user::UserView, services::auth::AuthService,
    utils::hash::random_token,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Issued-at, Unix timestamp.
    pub iat: i64,
    /// Expiration time as Unix timestamp.
    pub exp: i64,
    /// Random token id; two tokens issued within the same second still differ.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSnapshot>,
}

/// Identity fields copied into the token at issue time.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub email: String,
    pub display_name: String,
}

impl Claims {
    pub fn new(user_id: i64, snapshot: Option<UserSnapshot>, ttl_seconds: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl_seconds as i64,
            jti: Some(random_token(8)),
            user: snapshot,
        }
    }

    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub.parse().map_err(|_| AppError::MalformedToken)
    }
}

/// HS256 JSON Web Token encoder/decoder bound to one shared secret.
///
/// Tokens are `base64url(header).base64url(payload).base64url(signature)` with the
/// header fixed to `{"typ":"JWT","alg":"HS256"}`. Only `exp` is validated, with
/// zero leeway.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs `claims` into a compact token.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Verifies structure, algorithm, signature and expiry, in that order, and
    /// returns the payload.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, AppError> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AppError::InvalidSignature,
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                other => {
                    tracing::debug!(kind = ?other, "token rejected as malformed");
                    AppError::MalformedToken
                }
            })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AppError> {
    match header_value {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim()),
            _ => Err(AppError::MissingToken),
        },
        None => Err(AppError::MissingToken),
    }
}

fn authorization(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Axum Middleware: Authentication.
///
/// Resolves the bearer token to the current user and injects the `UserView`
/// into the request extensions. Any failure is logged and answered with 401.
pub async fn auth_middleware(
    State(auth): State<AuthService>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    match auth.verify(authorization(&req)).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => Err(reject(e)),
    }
}

/// Axum Middleware: Admin Authorization. Answers 401 or 403.
pub async fn admin_middleware(
    State(auth): State<AuthService>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    match auth.require_admin(authorization(&req)).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => Err(reject(e)),
    }
}

/// Axum Middleware: Founder Authorization. Answers 401 or 403.
pub async fn founder_middleware(
    State(auth): State<AuthService>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    match auth.require_founder(authorization(&req)).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Err(e) => Err(reject(e)),
    }
}

/// Axum Middleware: optional authentication for public listings.
///
/// A valid token injects `Some(UserView)`; no token or a rejected one injects `None`.
pub async fn viewer_middleware(
    State(auth): State<AuthService>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let viewer: Option<UserView> = match authorization(&req) {
        Some(value) => match auth.verify(Some(value)).await {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(reason = %e, "ignoring invalid viewer token");
                None
            }
        },
        None => None,
    };
    req.extensions_mut().insert(viewer);
    next.run(req).await
}

fn reject(err: AppError) -> StatusCode {
    match err {
        AppError::Forbidden => StatusCode::FORBIDDEN,
        e if e.is_verification_failure() || e == AppError::UserNotFound => {
            tracing::warn!(reason = %e, "request authentication failed");
            StatusCode::UNAUTHORIZED
        }
        e => {
            tracing::error!(error = %e, "authentication lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
