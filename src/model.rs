use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for the two variants of a content item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PostKind {
    Post,
    Page,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Post => "post",
            PostKind::Page => "page",
        }
    }

    /// Anything that is not explicitly a page is treated as a post.
    pub fn parse_kind(s: &str) -> PostKind {
        match s {
            "page" => PostKind::Page,
            _ => PostKind::Post,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub api_base: String,
    pub api_token: String,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub blog_id: i64,
    pub remote_id: i64,
    pub kind: PostKind,
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<String>,
    pub remote_url: Option<String>,
    pub date_posted: Option<DateTime<Utc>>,
}
