// src/storage/flat.rs

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{
        article::{Article, ArticleView, AuthorView, Category, NewArticle},
        comment::{Comment, CommentView, NewComment},
        notification::{NewNotification, Notification},
        user::{NewUser, User},
    },
    storage::{
        ArticleStore, UserStore,
        json::{Document, JsonStorage, JsonTxn},
    },
};

impl Document for User {
    const COLLECTION: &'static str = "users";
}

impl Document for Comment {
    const COLLECTION: &'static str = "comments";
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";
}

impl Document for Category {
    const COLLECTION: &'static str = "categories";
}

/// Flat-file article record; tags are kept inline by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleDoc {
    id: i64,
    author_id: i64,
    title: String,
    content: String,
    category_id: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

impl Document for ArticleDoc {
    const COLLECTION: &'static str = "articles";
}

impl From<ArticleDoc> for Article {
    fn from(doc: ArticleDoc) -> Self {
        Self {
            id: doc.id,
            author_id: doc.author_id,
            title: doc.title,
            content: doc.content,
            category_id: doc.category_id,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LikeDoc {
    id: i64,
    article_id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
}

impl Document for LikeDoc {
    const COLLECTION: &'static str = "likes";
}

/// Both storage capabilities over a directory of JSON collections.
pub struct FlatFileStore {
    db: JsonStorage,
}

impl FlatFileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        Ok(Self {
            db: JsonStorage::open(dir).await?,
        })
    }
}

async fn push_notification(tx: &mut JsonTxn<'_>, n: NewNotification) -> Result<(), AppError> {
    let now = Utc::now();
    tx.add(move |id| Notification {
        id,
        user_id: n.user_id,
        actor_id: n.actor_id,
        article_id: n.article_id,
        kind: n.kind,
        content: n.content,
        is_read: false,
        created_at: now,
    })
    .await?;
    Ok(())
}

fn author_of(users: &HashMap<i64, User>, id: i64) -> AuthorView {
    match users.get(&id) {
        Some(u) => AuthorView {
            id,
            display_name: u.display_name.clone(),
            photo_url: u.photo_url.clone(),
        },
        None => AuthorView {
            id,
            display_name: "[deleted]".to_string(),
            photo_url: None,
        },
    }
}

#[async_trait]
impl UserStore for FlatFileStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        self.db.get_by_id::<User>(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.db.find_one::<User, _>(|u| u.email == email).await
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, AppError> {
        self.db
            .find_one::<User, _>(|u| u.reset_token.as_deref() == Some(token))
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users = self.db.all::<User>().await?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut tx = self.db.begin().await;
        let email = user.email.clone();
        if tx.find_one::<User, _>(|u| u.email == email).await?.is_some() {
            return Err(AppError::EmailTaken);
        }
        let now = Utc::now();
        let created = tx
            .add(move |id| User {
                id,
                email: user.email,
                password: user.password_hash,
                display_name: user.display_name,
                photo_url: user.photo_url,
                is_admin: user.is_admin,
                is_founder: user.is_founder,
                auth_token: None,
                reset_token: None,
                reset_token_expires_at: None,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn start_session(
        &self,
        id: i64,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let updated = self
            .db
            .update::<User, _>(id, |u| {
                u.auth_token = Some(token.to_string());
                u.last_login_at = Some(at);
                u.updated_at = at;
            })
            .await?;
        Ok(updated.is_some())
    }

    async fn clear_session(&self, id: i64) -> Result<bool, AppError> {
        let updated = self
            .db
            .update::<User, _>(id, |u| {
                u.auth_token = None;
                u.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let updated = self
            .db
            .update::<User, _>(id, |u| {
                u.reset_token = Some(token.to_string());
                u.reset_token_expires_at = Some(expires_at);
                u.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool, AppError> {
        let updated = self
            .db
            .update::<User, _>(id, |u| {
                u.password = password_hash.to_string();
                u.reset_token = None;
                u.reset_token_expires_at = None;
                u.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await;
        let changed = tx
            .update_where::<User, _, _>(
                |u| {
                    u.reset_token.as_deref() == Some(token)
                        && u.reset_token_expires_at.is_some_and(|at| at > now)
                },
                |u| {
                    u.password = password_hash.to_string();
                    u.reset_token = None;
                    u.reset_token_expires_at = None;
                    u.updated_at = now;
                },
            )
            .await?;
        if changed == 0 {
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, AppError> {
        let updated = self
            .db
            .update::<User, _>(id, |u| {
                u.is_admin = is_admin;
                u.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }
}

#[async_trait]
impl ArticleStore for FlatFileStore {
    async fn create_article(&self, article: NewArticle) -> Result<i64, AppError> {
        let mut tx = self.db.begin().await;

        let category_id = match article.category {
            Some(name) => {
                let existing = tx
                    .find_one::<Category, _>(|c| c.name.eq_ignore_ascii_case(&name))
                    .await?;
                match existing {
                    Some(c) => Some(c.id),
                    None => Some(tx.add(move |id| Category { id, name }).await?.id),
                }
            }
            None => None,
        };

        let now = Utc::now();
        let doc = tx
            .add(move |id| ArticleDoc {
                id,
                author_id: article.author_id,
                title: article.title,
                content: article.content,
                category_id,
                tags: article.tags,
                created_at: now,
            })
            .await?;
        tx.commit().await?;
        Ok(doc.id)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>, AppError> {
        Ok(self.db.get_by_id::<ArticleDoc>(id).await?.map(Article::from))
    }

    async fn list_articles(&self, viewer: Option<i64>) -> Result<Vec<ArticleView>, AppError> {
        let mut articles = self.db.all::<ArticleDoc>().await?;
        let users: HashMap<i64, User> = self
            .db
            .all::<User>()
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let categories: HashMap<i64, String> = self
            .db
            .all::<Category>()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let likes = self.db.all::<LikeDoc>().await?;
        let mut comments = self.db.all::<Comment>().await?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let views = articles
            .into_iter()
            .map(|a| {
                let article_id = a.id;
                let article_comments: Vec<CommentView> = comments
                    .iter()
                    .filter(|c| c.article_id == article_id)
                    .map(|c| CommentView {
                        id: c.id,
                        article_id: c.article_id,
                        user_id: c.user_id,
                        author_name: author_of(&users, c.user_id).display_name,
                        content: c.content.clone(),
                        created_at: c.created_at,
                    })
                    .collect();
                let article_likes = likes.iter().filter(|l| l.article_id == article_id);
                let liked = viewer
                    .map(|v| article_likes.clone().any(|l| l.user_id == v))
                    .unwrap_or(false);

                ArticleView {
                    id: article_id,
                    author: author_of(&users, a.author_id),
                    category: a.category_id.and_then(|id| categories.get(&id).cloned()),
                    tags: a.tags,
                    likes_count: article_likes.count() as i64,
                    comments_count: article_comments.len() as i64,
                    comments: article_comments,
                    liked,
                    title: a.title,
                    content: a.content,
                    created_at: a.created_at,
                }
            })
            .collect();
        Ok(views)
    }

    async fn delete_article(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await;
        if tx.remove::<ArticleDoc, _>(|a| a.id == id).await? == 0 {
            return Ok(false);
        }
        tx.remove::<LikeDoc, _>(|l| l.article_id == id).await?;
        tx.remove::<Comment, _>(|c| c.article_id == id).await?;
        tx.remove::<Notification, _>(|n| n.article_id == id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn toggle_like(
        &self,
        article_id: i64,
        user_id: i64,
        notification: NewNotification,
    ) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await;
        let removed = tx
            .remove::<LikeDoc, _>(|l| l.article_id == article_id && l.user_id == user_id)
            .await?;
        if removed > 0 {
            tx.commit().await?;
            return Ok(false);
        }

        let now = Utc::now();
        tx.add(move |id| LikeDoc {
            id,
            article_id,
            user_id,
            created_at: now,
        })
        .await?;
        push_notification(&mut tx, notification).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn count_likes(&self, article_id: i64) -> Result<i64, AppError> {
        Ok(self
            .db
            .find::<LikeDoc, _>(|l| l.article_id == article_id)
            .await?
            .len() as i64)
    }

    async fn add_comment(
        &self,
        comment: NewComment,
        notification: NewNotification,
    ) -> Result<i64, AppError> {
        let mut tx = self.db.begin().await;
        let now = Utc::now();
        let created = tx
            .add(move |id| Comment {
                id,
                article_id: comment.article_id,
                user_id: comment.user_id,
                content: comment.content,
                created_at: now,
            })
            .await?;
        push_notification(&mut tx, notification).await?;
        tx.commit().await?;
        Ok(created.id)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        self.db.get_by_id::<Comment>(id).await
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await;
        let removed = tx.remove::<Comment, _>(|c| c.id == id).await?;
        if removed > 0 {
            tx.commit().await?;
        }
        Ok(removed > 0)
    }

    async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        let mut list = self
            .db
            .find::<Notification, _>(|n| n.user_id == user_id)
            .await?;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn mark_notifications_read(&self, user_id: i64) -> Result<u64, AppError> {
        let mut tx = self.db.begin().await;
        let changed = tx
            .update_where::<Notification, _, _>(
                |n| n.user_id == user_id && !n.is_read,
                |n| n.is_read = true,
            )
            .await?;
        tx.commit().await?;
        Ok(changed)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let mut categories = self.db.all::<Category>().await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}
