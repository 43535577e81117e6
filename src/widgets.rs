//! File-backed cache of per-site stats used by the home-screen widgets.
//!
//! One JSON file per widget kind lives under the app data directory, keyed
//! by remote site id. The cache is rebuilt from the visible blogs in the
//! database; stats already cached for a surviving site are preserved.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::db::{self, Pool};

pub const TODAY_CACHE_FILE: &str = "widget_today.json";
pub const ALL_TIME_CACHE_FILE: &str = "widget_all_time.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayStats {
    pub views: i64,
    pub visitors: i64,
    pub likes: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllTimeStats {
    pub views: i64,
    pub visitors: i64,
    pub posts: i64,
    pub best_views: i64,
}

/// Cached entry for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSiteData<T> {
    pub site_id: i64,
    pub site_name: String,
    pub url: String,
    pub date: DateTime<Utc>,
    pub stats: T,
}

pub struct WidgetCache<T> {
    path: PathBuf,
    _stats: PhantomData<T>,
}

impl WidgetCache<TodayStats> {
    pub fn today(data_dir: &Path) -> Self {
        Self::at(data_dir.join(TODAY_CACHE_FILE))
    }
}

impl WidgetCache<AllTimeStats> {
    pub fn all_time(data_dir: &Path) -> Self {
        Self::at(data_dir.join(ALL_TIME_CACHE_FILE))
    }
}

impl<T> WidgetCache<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    fn at(path: PathBuf) -> Self {
        Self {
            path,
            _stats: PhantomData,
        }
    }

    /// Read the cache file. `Ok(None)` when the file does not exist yet.
    pub fn read(&self) -> Result<Option<HashMap<i64, WidgetSiteData<T>>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let items = serde_json::from_str(&content)
            .with_context(|| format!("invalid widget cache JSON in {}", self.path.display()))?;
        Ok(Some(items))
    }

    pub fn write(&self, items: &HashMap<i64, WidgetSiteData<T>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// Rebuild the cached site set from the visible blogs in the database.
    /// Entries for surviving sites keep their stats and timestamps; sites no
    /// longer present locally are dropped. Initializes the file when absent.
    pub async fn refresh_site_list(&self, pool: &Pool) -> Result<()> {
        let current = self.read()?.unwrap_or_default();
        if current.is_empty() {
            info!(path = %self.path.display(), "initializing widget cache");
        }

        let blogs = db::list_visible_blogs(pool).await?;
        let mut next = HashMap::new();
        for blog in blogs {
            let existing = current.get(&blog.site_id);
            let site_name = blog
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| blog.url.clone());
            next.insert(
                blog.site_id,
                WidgetSiteData {
                    site_id: blog.site_id,
                    site_name,
                    url: blog.url,
                    date: existing.map(|e| e.date).unwrap_or_else(Utc::now),
                    stats: existing.map(|e| e.stats.clone()).unwrap_or_default(),
                },
            );
        }
        self.write(&next)
    }

    /// Store fresh stats for one site. Returns false (and drops the cached
    /// entry) when the site no longer exists locally.
    pub async fn store_stats(&self, pool: &Pool, site_id: i64, stats: T) -> Result<bool> {
        let mut items = match self.read()? {
            Some(items) => items,
            None => {
                self.refresh_site_list(pool).await?;
                self.read()?.unwrap_or_default()
            }
        };

        let Some(blog) = db::find_blog_by_site_id(pool, site_id).await? else {
            warn!(site_id, "widget stats for a site that no longer exists locally");
            items.remove(&site_id);
            self.write(&items)?;
            return Ok(false);
        };

        let site_name = blog
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| blog.url.clone());
        items.insert(
            site_id,
            WidgetSiteData {
                site_id,
                site_name,
                url: blog.url,
                date: Utc::now(),
                stats,
            },
        );
        self.write(&items)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;
    use tempfile::tempdir;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn refresh_builds_cache_from_visible_blogs() {
        let pool = setup_pool().await;
        let td = tempdir().unwrap();
        db::insert_blog(&pool, 10, "https://a.example", Some("Site A"), "https://api.a", "t")
            .await
            .unwrap();
        db::insert_blog(&pool, 20, "https://b.example", None, "https://api.b", "t")
            .await
            .unwrap();

        let cache = WidgetCache::today(td.path());
        cache.refresh_site_list(&pool).await.unwrap();

        let items = cache.read().unwrap().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[&10].site_name, "Site A");
        // Untitled sites fall back to the URL.
        assert_eq!(items[&20].site_name, "https://b.example");
        assert_eq!(items[&10].stats, TodayStats::default());
    }

    #[tokio::test]
    async fn refresh_preserves_existing_stats() {
        let pool = setup_pool().await;
        let td = tempdir().unwrap();
        db::insert_blog(&pool, 10, "https://a.example", Some("Site A"), "https://api.a", "t")
            .await
            .unwrap();

        let cache = WidgetCache::today(td.path());
        let stats = TodayStats {
            views: 5,
            visitors: 3,
            likes: 1,
            comments: 0,
        };
        assert!(cache.store_stats(&pool, 10, stats).await.unwrap());

        cache.refresh_site_list(&pool).await.unwrap();
        let items = cache.read().unwrap().unwrap();
        assert_eq!(items[&10].stats, stats);
    }

    #[tokio::test]
    async fn store_stats_drops_unknown_site() {
        let pool = setup_pool().await;
        let td = tempdir().unwrap();
        db::insert_blog(&pool, 10, "https://a.example", None, "https://api.a", "t")
            .await
            .unwrap();

        let cache = WidgetCache::all_time(td.path());
        cache.refresh_site_list(&pool).await.unwrap();

        let stored = cache
            .store_stats(&pool, 999, AllTimeStats::default())
            .await
            .unwrap();
        assert!(!stored);
        let items = cache.read().unwrap().unwrap();
        assert!(!items.contains_key(&999));
        assert!(items.contains_key(&10));
    }
}
