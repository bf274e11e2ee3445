// src/models/article.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::comment::CommentView;

/// Represents the 'articles' table. Aggregates are never stored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Author summary embedded in listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorView {
    pub id: i64,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// An article as listed, with aggregates computed at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: AuthorView,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    /// Newest first.
    pub comments: Vec<CommentView>,
    /// Whether the viewer has liked this article. Always false for anonymous viewers.
    pub liked: bool,
}

/// Article ready to persist; content already sanitized.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// DTO for creating a new article.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateArticleRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 20000,
        message = "Content length must be between 1 and 20000 chars"
    ))]
    pub content: String,

    #[validate(length(min = 1, max = 50, message = "Category must be between 1 and 50 chars"))]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeStatus {
    pub liked: bool,
}
