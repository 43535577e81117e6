use super::model::{blog_from_row, post_from_row, PostFields};
use crate::model::{Blog, Post, PostKind};
use anyhow::Result;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
    Ok(pool)
}

/// For a file-backed SQLite URL, expand a leading `~/` and make sure the
/// parent directory exists. In-memory URLs and non-sqlite schemes pass
/// through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{}?{}", path, q),
        None => format!("sqlite://{}", path),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_blog(
    pool: &Pool,
    site_id: i64,
    url: &str,
    title: Option<&str>,
    api_base: &str,
    api_token: &str,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO blogs (site_id, url, title, api_base, api_token) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(site_id)
    .bind(url)
    .bind(title)
    .bind(api_base)
    .bind(api_token)
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn find_blog(pool: &Pool, blog_id: i64) -> Result<Option<Blog>> {
    let row = sqlx::query("SELECT * FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(blog_from_row))
}

#[instrument(skip_all)]
pub async fn find_blog_by_site_id(pool: &Pool, site_id: i64) -> Result<Option<Blog>> {
    let row = sqlx::query("SELECT * FROM blogs WHERE site_id = ?")
        .bind(site_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(blog_from_row))
}

#[instrument(skip_all)]
pub async fn list_visible_blogs(pool: &Pool) -> Result<Vec<Blog>> {
    let rows = sqlx::query("SELECT * FROM blogs WHERE visible = 1 ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(blog_from_row).collect())
}

#[instrument(skip_all)]
pub async fn find_post(pool: &Pool, post_row_id: i64) -> Result<Option<Post>> {
    let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
        .bind(post_row_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(post_from_row))
}

/// Transaction-scoped blog lookup. References obtained outside a transaction
/// are not valid inside one; callers re-resolve within their own scope.
pub async fn find_blog_tx(tx: &mut Transaction<'_, Sqlite>, blog_id: i64) -> Result<Option<Blog>> {
    let row = sqlx::query("SELECT * FROM blogs WHERE id = ?")
        .bind(blog_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.as_ref().map(blog_from_row))
}

/// Look up a local post by its remote identifier, scoped to one blog.
pub async fn lookup_post_tx(
    tx: &mut Transaction<'_, Sqlite>,
    blog_id: i64,
    remote_id: i64,
) -> Result<Option<(i64, PostKind)>> {
    let row = sqlx::query("SELECT id, kind FROM posts WHERE blog_id = ? AND remote_id = ?")
        .bind(blog_id)
        .bind(remote_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|r| {
        let kind: String = r.get("kind");
        (r.get::<i64, _>("id"), PostKind::parse_kind(&kind))
    }))
}

pub async fn insert_post_tx(
    tx: &mut Transaction<'_, Sqlite>,
    blog_id: i64,
    remote_id: i64,
    kind: PostKind,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO posts (blog_id, remote_id, kind) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(blog_id)
    .bind(remote_id)
    .bind(kind.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

/// Field-by-field copy of a remote snapshot onto a local row.
pub async fn apply_post_fields_tx(
    tx: &mut Transaction<'_, Sqlite>,
    post_row_id: i64,
    fields: &PostFields,
) -> Result<()> {
    sqlx::query(
        "UPDATE posts SET title = ?, content = ?, excerpt = ?, status = ?, remote_url = ?, \
         date_posted = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(&fields.title)
    .bind(&fields.content)
    .bind(&fields.excerpt)
    .bind(&fields.status)
    .bind(&fields.remote_url)
    .bind(fields.date_posted)
    .bind(post_row_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn blog_insert_and_lookup() {
        let pool = setup_pool().await;
        let id = insert_blog(
            &pool,
            1001,
            "https://example.wordpress.com",
            Some("Example"),
            "https://public-api.example.com/rest/v1.1",
            "token-1",
        )
        .await
        .unwrap();

        let blog = find_blog(&pool, id).await.unwrap().unwrap();
        assert_eq!(blog.site_id, 1001);
        assert!(blog.visible);
        assert_eq!(blog.title.as_deref(), Some("Example"));

        let by_site = find_blog_by_site_id(&pool, 1001).await.unwrap().unwrap();
        assert_eq!(by_site.id, id);

        assert!(find_blog(&pool, id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn post_lookup_is_scoped_to_blog() {
        let pool = setup_pool().await;
        let b1 = insert_blog(&pool, 1, "https://one.example", None, "https://api.one", "t1")
            .await
            .unwrap();
        let b2 = insert_blog(&pool, 2, "https://two.example", None, "https://api.two", "t2")
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        let p1 = insert_post_tx(&mut tx, b1, 77, PostKind::Post).await.unwrap();
        let p2 = insert_post_tx(&mut tx, b2, 77, PostKind::Page).await.unwrap();
        assert_ne!(p1, p2);

        let found = lookup_post_tx(&mut tx, b1, 77).await.unwrap().unwrap();
        assert_eq!(found, (p1, PostKind::Post));
        let found = lookup_post_tx(&mut tx, b2, 77).await.unwrap().unwrap();
        assert_eq!(found, (p2, PostKind::Page));
        assert!(lookup_post_tx(&mut tx, b1, 78).await.unwrap().is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn apply_fields_updates_row() {
        let pool = setup_pool().await;
        let blog = insert_blog(&pool, 9, "https://nine.example", None, "https://api.nine", "t")
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        let post_id = insert_post_tx(&mut tx, blog, 5, PostKind::Post).await.unwrap();
        let fields = PostFields {
            title: Some("Hello".into()),
            content: Some("<p>Body</p>".into()),
            status: Some("publish".into()),
            ..Default::default()
        };
        apply_post_fields_tx(&mut tx, post_id, &fields).await.unwrap();
        tx.commit().await.unwrap();

        let post = find_post(&pool, post_id).await.unwrap().unwrap();
        assert_eq!(post.title.as_deref(), Some("Hello"));
        assert_eq!(post.status.as_deref(), Some("publish"));
        assert_eq!(post.remote_id, 5);
    }

    #[test]
    fn sqlite_url_normalization() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
        assert_eq!(
            prepare_sqlite_url("sqlite:/tmp/wp-sync-test/a.db?mode=rwc"),
            "sqlite:///tmp/wp-sync-test/a.db?mode=rwc"
        );
    }
}
