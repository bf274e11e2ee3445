// src/handlers/auth.rs

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
        ResetPasswordRequest, UserView,
    },
    services::auth::AuthService,
};

/// Registers a new user.
///
/// Returns 201 Created with the public user view and a session token.
pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let response = auth
        .register(
            &payload.email,
            &payload.password,
            &payload.display_name,
            payload.photo_url,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Authenticates a user and returns a JWT token.
/// Any previously issued token for the user stops working.
pub async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = auth.login(&payload.email, &payload.password).await?;
    Ok(Json(response))
}

/// Returns the user behind the bearer token.
/// A token whose subject no longer exists is answered like any other bad token.
pub async fn verify(
    State(auth): State<AuthService>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let user = auth.verify(authorization).await.map_err(|e| match e {
        AppError::UserNotFound => AppError::SessionInvalid,
        e => e,
    })?;
    Ok(Json(user))
}

pub async fn logout(
    State(auth): State<AuthService>,
    Extension(user): Extension<UserView>,
) -> Result<impl IntoResponse, AppError> {
    auth.logout(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Starts a password reset. The token is not part of the response.
pub async fn forgot_password(
    State(auth): State<AuthService>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.request_password_reset(&payload.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Password reset instructions have been sent" })),
    ))
}

pub async fn reset_password(
    State(auth): State<AuthService>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(auth): State<AuthService>,
    Extension(user): Extension<UserView>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth.update_password(user.id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
