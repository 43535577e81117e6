use crate::model::{Blog, Post, PostKind};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Field set applied onto a local post row during reconciliation.
/// Built from a remote snapshot; the repository never keeps the remote
/// record past a single sync call.
#[derive(Debug, Clone, Default)]
pub struct PostFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<String>,
    pub remote_url: Option<String>,
    pub date_posted: Option<DateTime<Utc>>,
}

pub(crate) fn blog_from_row(row: &SqliteRow) -> Blog {
    Blog {
        id: row.get("id"),
        site_id: row.get("site_id"),
        url: row.get("url"),
        title: row.try_get("title").ok(),
        api_base: row.get("api_base"),
        api_token: row.get("api_token"),
        visible: row.get::<i64, _>("visible") != 0,
        created_at: row.get("created_at"),
    }
}

pub(crate) fn post_from_row(row: &SqliteRow) -> Post {
    let kind: String = row.get("kind");
    Post {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        remote_id: row.get("remote_id"),
        kind: PostKind::parse_kind(&kind),
        title: row.try_get("title").ok(),
        content: row.try_get("content").ok(),
        excerpt: row.try_get("excerpt").ok(),
        status: row.try_get("status").ok(),
        remote_url: row.try_get("remote_url").ok(),
        date_posted: row.try_get::<Option<DateTime<Utc>>, _>("date_posted").ok().flatten(),
    }
}
