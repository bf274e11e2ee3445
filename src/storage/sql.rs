// src/storage/sql.rs

use std::{collections::HashMap, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, SqliteConnection, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    error::AppError,
    models::{
        article::{Article, ArticleView, AuthorView, Category, NewArticle},
        comment::{Comment, CommentView, NewComment},
        notification::{NewNotification, Notification, NotificationKind},
        user::{NewUser, User},
    },
    storage::{ArticleStore, UserStore},
};

const USER_COLUMNS: &str = "id, email, password, display_name, photo_url, is_admin, is_founder, \
     auth_token, reset_token, reset_token_expires_at, last_login_at, created_at, updated_at";

/// Both storage capabilities over a SQLite pool.
#[derive(Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connects to `database_url`, creating the file if needed, and applies migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// A private in-memory database. One connection that never expires, since
    /// each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, AppError> {
        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    author_id: i64,
    author_name: String,
    author_photo_url: Option<String>,
    category: Option<String>,
    likes_count: i64,
    comments_count: i64,
    liked: i64,
}

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    actor_id: i64,
    article_id: i64,
    kind: String,
    content: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            actor_id: row.actor_id,
            article_id: row.article_id,
            kind: NotificationKind::from_str(&row.kind).map_err(AppError::PersistenceFailure)?,
            content: row.content,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

async fn insert_notification(
    conn: &mut SqliteConnection,
    n: &NewNotification,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, actor_id, article_id, kind, content, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, FALSE, ?)
        "#,
    )
    .bind(n.user_id)
    .bind(n.actor_id)
    .bind(n.article_id)
    .bind(n.kind.as_str())
    .bind(&n.content)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl UserStore for SqlStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE reset_token = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO users (email, password, display_name, photo_url, is_admin, is_founder, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.display_name)
            .bind(&user.photo_url)
            .bind(user.is_admin)
            .bind(user.is_founder)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::EmailTaken,
                e => {
                    tracing::error!("Failed to insert user: {:?}", e);
                    AppError::from(e)
                }
            })
    }

    async fn start_session(
        &self,
        id: i64,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET auth_token = ?, last_login_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(at)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_session(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET auth_token = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET reset_token = ?, reset_token_expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password = ?, reset_token = NULL, reset_token_expires_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password = ?, reset_token = NULL, reset_token_expires_at = NULL, updated_at = ?
            WHERE reset_token = ? AND julianday(reset_token_expires_at) > julianday(?)
            "#,
        )
        .bind(password_hash)
        .bind(now)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ArticleStore for SqlStore {
    async fn create_article(&self, article: NewArticle) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let category_id: Option<i64> = match &article.category {
            Some(name) => {
                sqlx::query("INSERT INTO categories (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                let (id,): (i64,) = sqlx::query_as("SELECT id FROM categories WHERE name = ?")
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;
                Some(id)
            }
            None => None,
        };

        let (article_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO articles (author_id, title, content, category_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(article.author_id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(category_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for tag in &article.tags {
            sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
                .bind(tag)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO article_tags (article_id, tag_id)
                SELECT ?, id FROM tags WHERE name = ?
                "#,
            )
            .bind(article_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(article_id)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>, AppError> {
        let article = sqlx::query_as::<_, Article>(
            "SELECT id, author_id, title, content, category_id, created_at FROM articles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn list_articles(&self, viewer: Option<i64>) -> Result<Vec<ArticleView>, AppError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT
                a.id, a.title, a.content, a.created_at,
                a.author_id, u.display_name AS author_name, u.photo_url AS author_photo_url,
                c.name AS category,
                (SELECT COUNT(*) FROM likes l WHERE l.article_id = a.id) AS likes_count,
                (SELECT COUNT(*) FROM comments cm WHERE cm.article_id = a.id) AS comments_count,
                EXISTS (SELECT 1 FROM likes l WHERE l.article_id = a.id AND l.user_id = ?) AS liked
            FROM articles a
            JOIN users u ON u.id = a.author_id
            LEFT JOIN categories c ON c.id = a.category_id
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
        let tag_rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT at.article_id, t.name
            FROM article_tags at
            JOIN tags t ON t.id = at.tag_id
            ORDER BY t.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for (article_id, name) in tag_rows {
            tags.entry(article_id).or_default().push(name);
        }

        let mut comments: HashMap<i64, Vec<CommentView>> = HashMap::new();
        let comment_rows = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.article_id, c.user_id, u.display_name AS author_name, c.content, c.created_at
            FROM comments c
            JOIN users u ON u.id = c.user_id
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for comment in comment_rows {
            comments.entry(comment.article_id).or_default().push(comment);
        }

        Ok(rows
            .into_iter()
            .map(|row| ArticleView {
                id: row.id,
                title: row.title,
                content: row.content,
                created_at: row.created_at,
                author: AuthorView {
                    id: row.author_id,
                    display_name: row.author_name,
                    photo_url: row.author_photo_url,
                },
                category: row.category,
                tags: tags.remove(&row.id).unwrap_or_default(),
                likes_count: row.likes_count,
                comments_count: row.comments_count,
                comments: comments.remove(&row.id).unwrap_or_default(),
                liked: row.liked != 0,
            })
            .collect())
    }

    async fn delete_article(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        for sql in [
            "DELETE FROM notifications WHERE article_id = ?",
            "DELETE FROM likes WHERE article_id = ?",
            "DELETE FROM comments WHERE article_id = ?",
            "DELETE FROM article_tags WHERE article_id = ?",
        ] {
            sqlx::query(sql).bind(id).execute(&mut *tx).await?;
        }
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn toggle_like(
        &self,
        article_id: i64,
        user_id: i64,
        notification: NewNotification,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // Writing first takes SQLite's write lock, so concurrent toggles serialize here.
        let removed = sqlx::query("DELETE FROM likes WHERE article_id = ? AND user_id = ?")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            tx.commit().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO likes (article_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(article_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        insert_notification(&mut *tx, &notification).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn count_likes(&self, article_id: i64) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE article_id = ?")
            .bind(article_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn add_comment(
        &self,
        comment: NewComment,
        notification: NewNotification,
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO comments (article_id, user_id, content, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(comment.article_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        insert_notification(&mut *tx, &notification).await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, article_id, user_id, content, created_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, actor_id, article_id, kind, content, is_read, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_notifications_read(&self, user_id: i64) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = ? AND is_read = FALSE")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }
}
