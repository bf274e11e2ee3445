use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{error::AppError, models::user::UserView, services::article::ArticleService};

/// Notifications for the current user, newest first.
pub async fn list_notifications(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(articles.notifications(user.id).await?))
}

pub async fn mark_read(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
) -> Result<impl IntoResponse, AppError> {
    let updated = articles.mark_notifications_read(user.id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
