//! Media upload against a blog's remote media endpoint.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::db::{self, Pool};
use crate::remote::model::RemoteMedia;
use crate::remote::WpApiClient;

pub struct MediaService {
    pool: Pool,
    user_agent: String,
    timeout: Duration,
}

impl MediaService {
    pub fn new(pool: Pool, user_agent: &str, timeout: Duration) -> Self {
        Self {
            pool,
            user_agent: user_agent.to_string(),
            timeout,
        }
    }

    /// Upload a local file as new media on the given blog and return the
    /// remote record. The blog must resolve locally and carry credentials.
    pub async fn upload(&self, blog_id: i64, file_path: &Path) -> Result<RemoteMedia> {
        let blog = db::find_blog(&self.pool, blog_id)
            .await?
            .ok_or_else(|| anyhow!("blog {} not found", blog_id))?;
        let client = WpApiClient::for_blog(&blog, &self.user_agent, self.timeout)?;
        let media = client.upload_media(file_path).await?;
        info!(media_id = media.id, "media upload succeeded");
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn service(pool: Pool) -> MediaService {
        MediaService::new(pool, "wp-sync/0.1", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn upload_rejects_unknown_blog() {
        let pool = setup_pool().await;
        let err = service(pool)
            .upload(999, Path::new("a.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn upload_rejects_blog_without_credentials() {
        let pool = setup_pool().await;
        let blog_id = db::insert_blog(&pool, 1, "https://a.example", None, "https://api.a/", "")
            .await
            .unwrap();
        let err = service(pool)
            .upload(blog_id, Path::new("a.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API token"));
    }
}
