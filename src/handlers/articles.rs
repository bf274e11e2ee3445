use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{article::CreateArticleRequest, comment::CreateCommentRequest, user::UserView},
    services::article::ArticleService,
};

/// List articles (Recent first) with likes, comments, tags and category.
/// `liked` reflects the caller when a valid token is supplied.
pub async fn list_articles(
    State(articles): State<ArticleService>,
    Extension(viewer): Extension<Option<UserView>>,
) -> Result<impl IntoResponse, AppError> {
    let list = articles.list(viewer.map(|v| v.id)).await?;
    Ok(Json(list))
}

/// Create a new article.
pub async fn create_article(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = articles.create(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Delete an article.
/// Requires: Login + (Author OR Admin/Founder).
pub async fn delete_article(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    articles.delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle Like on an article.
pub async fn toggle_like(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
    Path(article_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let status = articles.toggle_like(article_id, user.id).await?;
    Ok(Json(status))
}

/// Create a new comment.
pub async fn create_comment(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
    Path(article_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let id = articles
        .add_comment(article_id, user.id, &payload.content)
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Remove a comment. Answers `{"removed": false}` when the caller may not remove it.
pub async fn delete_comment(
    State(articles): State<ArticleService>,
    Extension(user): Extension<UserView>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let removed = articles.remove_comment(comment_id, user.id).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

pub async fn list_categories(
    State(articles): State<ArticleService>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(articles.categories().await?))
}
