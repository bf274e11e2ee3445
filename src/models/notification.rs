use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(NotificationKind::Like),
            "comment" => Ok(NotificationKind::Comment),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

/// A notice for `user_id` about something `actor_id` did on one of their articles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub actor_id: i64,
    pub article_id: i64,
    pub kind: NotificationKind,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub actor_id: i64,
    pub article_id: i64,
    pub kind: NotificationKind,
    pub content: String,
}

impl NewNotification {
    pub fn like(author_id: i64, actor: &str, actor_id: i64, article_id: i64, title: &str) -> Self {
        Self {
            user_id: author_id,
            actor_id,
            article_id,
            kind: NotificationKind::Like,
            content: format!("{} liked your article \"{}\"", actor, title),
        }
    }

    pub fn comment(
        author_id: i64,
        actor: &str,
        actor_id: i64,
        article_id: i64,
        title: &str,
    ) -> Self {
        Self {
            user_id: author_id,
            actor_id,
            article_id,
            kind: NotificationKind::Comment,
            content: format!("{} commented on your article \"{}\"", actor, title),
        }
    }
}
