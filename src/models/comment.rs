use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'comments' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CommentView {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Comment ready to persist; content already sanitized.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: i64,
    pub user_id: i64,
    pub content: String,
}
