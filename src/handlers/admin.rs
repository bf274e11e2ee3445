// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::user::{SetAdminRequest, UserView},
    services::auth::AuthService,
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(auth): State<AuthService>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(auth.list_users().await?))
}

/// Grants or revokes the admin flag.
/// Founder only. A founder cannot revoke their own admin flag.
pub async fn set_admin(
    State(auth): State<AuthService>,
    Extension(founder): Extension<UserView>,
    Path(id): Path<i64>,
    Json(payload): Json<SetAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    if id == founder.id && !payload.is_admin {
        return Err(AppError::BadRequest(
            "Cannot revoke your own admin rights".to_string(),
        ));
    }

    let user = auth.set_admin(id, payload.is_admin).await?;
    Ok(Json(user))
}
