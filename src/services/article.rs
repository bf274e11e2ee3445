// src/services/article.rs

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppError,
    models::{
        article::{ArticleView, Category, CreateArticleRequest, LikeStatus, NewArticle},
        comment::NewComment,
        notification::{NewNotification, Notification},
        user::User,
    },
    storage::{ArticleStore, UserStore},
    utils::html::{clean_html, clean_text},
};

const MAX_COMMENT_CHARS: usize = 1000;
const MAX_TAGS: usize = 10;

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticleStore>,
    users: Arc<dyn UserStore>,
}

impl ArticleService {
    pub fn new(articles: Arc<dyn ArticleStore>, users: Arc<dyn UserStore>) -> Self {
        Self { articles, users }
    }

    async fn user(&self, id: i64) -> Result<User, AppError> {
        self.users.find_by_id(id).await?.ok_or(AppError::UserNotFound)
    }

    /// All articles newest first. `viewer_id` only affects the `liked` flags.
    pub async fn list(&self, viewer_id: Option<i64>) -> Result<Vec<ArticleView>, AppError> {
        self.articles.list_articles(viewer_id).await
    }

    pub async fn create(&self, author_id: i64, req: CreateArticleRequest) -> Result<i64, AppError> {
        req.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let author = self.user(author_id).await?;

        let title = clean_text(&req.title);
        let content = clean_html(&req.content);
        if title.is_empty() || content.is_empty() {
            return Err(AppError::BadRequest(
                "Title and content must not be empty".to_string(),
            ));
        }

        let category = req.category.map(|c| clean_text(&c)).filter(|c| !c.is_empty());

        let mut tags: Vec<String> = req
            .tags
            .iter()
            .map(|t| clean_text(t).to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        if tags.len() > MAX_TAGS {
            return Err(AppError::BadRequest(format!(
                "At most {} tags are allowed",
                MAX_TAGS
            )));
        }

        let id = self
            .articles
            .create_article(NewArticle {
                author_id: author.id,
                title,
                content,
                category,
                tags,
            })
            .await?;
        tracing::info!(article_id = id, author_id, "article created");
        Ok(id)
    }

    /// Only the author or a moderator may delete an article.
    pub async fn delete(&self, article_id: i64, user_id: i64) -> Result<(), AppError> {
        let article = self
            .articles
            .find_article(article_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Article".to_string()))?;
        let user = self.user(user_id).await?;

        if article.author_id != user.id && !user.is_moderator() {
            return Err(AppError::Forbidden);
        }

        if !self.articles.delete_article(article_id).await? {
            return Err(AppError::NotFound("Article".to_string()));
        }
        tracing::info!(article_id, user_id, "article deleted");
        Ok(())
    }

    /// Likes the article, or removes the like if it already exists.
    /// A new like notifies the article's author.
    pub async fn toggle_like(&self, article_id: i64, user_id: i64) -> Result<LikeStatus, AppError> {
        let article = self
            .articles
            .find_article(article_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Article".to_string()))?;
        let actor = self.user(user_id).await?;

        let notification = NewNotification::like(
            article.author_id,
            &actor.display_name,
            actor.id,
            article.id,
            &article.title,
        );
        let liked = self
            .articles
            .toggle_like(article.id, actor.id, notification)
            .await?;

        tracing::debug!(article_id, user_id, liked, "like toggled");
        Ok(LikeStatus { liked })
    }

    pub async fn likes_count(&self, article_id: i64) -> Result<i64, AppError> {
        self.articles.count_likes(article_id).await
    }

    /// Inserts the comment and notifies the article's author; returns the comment id.
    pub async fn add_comment(
        &self,
        article_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<i64, AppError> {
        let content = clean_html(content);
        if content.is_empty() || content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::BadRequest(format!(
                "Comment must be between 1 and {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        let article = self
            .articles
            .find_article(article_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Article".to_string()))?;
        let actor = self.user(user_id).await?;

        let notification = NewNotification::comment(
            article.author_id,
            &actor.display_name,
            actor.id,
            article.id,
            &article.title,
        );
        let id = self
            .articles
            .add_comment(
                NewComment {
                    article_id: article.id,
                    user_id: actor.id,
                    content,
                },
                notification,
            )
            .await?;

        tracing::info!(comment_id = id, article_id, user_id, "comment added");
        Ok(id)
    }

    /// Removes the comment if `user_id` wrote it or is a moderator.
    /// Returns whether a comment was removed.
    pub async fn remove_comment(&self, comment_id: i64, user_id: i64) -> Result<bool, AppError> {
        let Some(comment) = self.articles.find_comment(comment_id).await? else {
            return Ok(false);
        };
        let user = self.user(user_id).await?;

        if comment.user_id != user.id && !user.is_moderator() {
            tracing::warn!(comment_id, user_id, "comment removal refused");
            return Ok(false);
        }

        let removed = self.articles.delete_comment(comment_id).await?;
        if removed {
            tracing::info!(comment_id, user_id, "comment removed");
        }
        Ok(removed)
    }

    pub async fn notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        self.articles.list_notifications(user_id).await
    }

    pub async fn mark_notifications_read(&self, user_id: i64) -> Result<u64, AppError> {
        self.articles.mark_notifications_read(user_id).await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, AppError> {
        self.articles.list_categories().await
    }
}
