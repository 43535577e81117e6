use crate::db::PostFields;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Transient snapshot of a post as returned by the WordPress REST API.
/// Created per fetch call and discarded after reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePost {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub post_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl RemotePost {
    pub fn to_fields(&self) -> PostFields {
        PostFields {
            title: self.title.clone(),
            content: self.content.clone(),
            excerpt: self.excerpt.clone(),
            status: self.status.clone(),
            remote_url: self.url.clone(),
            date_posted: self.date,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMedia {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Envelope returned by the `media/new` endpoint.
#[derive(Debug, Deserialize)]
pub struct MediaUploadResponse {
    pub media: Vec<RemoteMedia>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_post_deserializes_api_payload() {
        let body = r#"{
            "ID": 1024,
            "type": "page",
            "title": "About",
            "content": "<p>Hi</p>",
            "excerpt": "",
            "status": "publish",
            "URL": "https://example.wordpress.com/about",
            "date": "2024-03-01T10:30:00Z"
        }"#;
        let post: RemotePost = serde_json::from_str(body).unwrap();
        assert_eq!(post.id, 1024);
        assert_eq!(post.post_type, "page");
        assert_eq!(post.title.as_deref(), Some("About"));

        let fields = post.to_fields();
        assert_eq!(fields.remote_url.as_deref(), Some("https://example.wordpress.com/about"));
        assert!(fields.date_posted.is_some());
    }

    #[test]
    fn remote_post_tolerates_missing_optionals() {
        let post: RemotePost = serde_json::from_str(r#"{"ID": 7}"#).unwrap();
        assert_eq!(post.id, 7);
        assert_eq!(post.post_type, "");
        assert!(post.title.is_none());
    }
}
