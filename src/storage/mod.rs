// src/storage/mod.rs

//! Storage capabilities shared by both backends.
//!
//! Services only ever see `Arc<dyn UserStore>` / `Arc<dyn ArticleStore>`;
//! which implementation sits behind them is decided once in `main`.

pub mod flat;
pub mod json;
pub mod sql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::{Config, StorageBackend},
    error::AppError,
    models::{
        article::{Article, ArticleView, Category, NewArticle},
        comment::{Comment, NewComment},
        notification::{NewNotification, Notification},
        user::{NewUser, User},
    },
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// `email` is expected in its normalized (lower-cased) form.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Fails with `EmailTaken` when the email already exists.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    /// Stores `token` as the only valid session and records the login time.
    /// Returns false if the user does not exist.
    async fn start_session(
        &self,
        id: i64,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn clear_session(&self, id: i64) -> Result<bool, AppError>;

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Replaces the password hash and clears any pending reset token.
    async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError>;

    /// Sets the password of the user holding `token`, provided it has not expired
    /// at `now`, and clears the token in the same write. Returns false when no
    /// user holds a live `token`, so each token succeeds at most once.
    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Creates the article, plus its category and tags if they do not exist yet.
    async fn create_article(&self, article: NewArticle) -> Result<i64, AppError>;

    async fn find_article(&self, id: i64) -> Result<Option<Article>, AppError>;

    /// All articles newest first with aggregates; `liked` is computed for `viewer`.
    async fn list_articles(&self, viewer: Option<i64>) -> Result<Vec<ArticleView>, AppError>;

    /// Deletes the article together with its likes, comments, tags links and notifications.
    async fn delete_article(&self, id: i64) -> Result<bool, AppError>;

    /// Atomically removes the `(article, user)` like if present, or inserts it together
    /// with `notification`. Returns whether the article is now liked.
    async fn toggle_like(
        &self,
        article_id: i64,
        user_id: i64,
        notification: NewNotification,
    ) -> Result<bool, AppError>;

    async fn count_likes(&self, article_id: i64) -> Result<i64, AppError>;

    /// Atomically inserts the comment and `notification`.
    async fn add_comment(
        &self,
        comment: NewComment,
        notification: NewNotification,
    ) -> Result<i64, AppError>;

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, AppError>;

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError>;

    /// Newest first.
    async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError>;

    async fn mark_notifications_read(&self, user_id: i64) -> Result<u64, AppError>;

    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;
}

/// Both capabilities, backed by the same underlying store.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub articles: Arc<dyn ArticleStore>,
}

impl Stores {
    pub fn flat(store: flat::FlatFileStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            articles: store,
        }
    }

    pub fn sql(store: sql::SqlStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            articles: store,
        }
    }

    /// Opens whichever backend `config.storage` names.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match config.storage {
            StorageBackend::Json => {
                tracing::info!(dir = %config.data_dir.display(), "using flat-file storage");
                let store = flat::FlatFileStore::open(&config.data_dir).await?;
                Ok(Self::flat(store))
            }
            StorageBackend::Sqlite => {
                tracing::info!("using sqlite storage");
                let store = sql::SqlStore::connect(&config.database_url).await?;
                Ok(Self::sql(store))
            }
        }
    }
}
