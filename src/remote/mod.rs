use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

use crate::model::Blog;
use crate::remote::model::{MediaUploadResponse, RemoteMedia, RemotePost};

pub mod model;

const WPCOM_API_BASE: &str = "https://public-api.wordpress.com/rest/v1.1/";

/// Success/failure callbacks of the legacy post service interface.
/// Exactly one of the two is expected to fire exactly once per call;
/// the repository defends against violations of that contract.
pub type PostSuccess = Box<dyn FnOnce(Option<RemotePost>) + Send + 'static>;
pub type PostFailure = Box<dyn FnOnce(Option<anyhow::Error>) + Send + 'static>;

/// Legacy callback-style remote post service.
pub trait PostServiceRemote: Send + Sync {
    fn get_post_with_id(&self, post_id: i64, success: PostSuccess, failure: PostFailure);
}

/// Produces a remote client for one resolved local blog. Construction fails
/// when the blog carries no usable endpoint or credentials.
pub trait PostServiceRemoteFactory: Send + Sync {
    fn for_blog(&self, blog: &Blog) -> Result<Box<dyn PostServiceRemote>>;
}

/// REST client scoped to a single blog (endpoint + bearer token).
#[derive(Clone)]
pub struct WpApiClient {
    http: Client,
    base_url: Url,
    token: String,
    site_id: i64,
}

impl fmt::Debug for WpApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WpApiClient")
            .field("base_url", &self.base_url)
            .field("site_id", &self.site_id)
            .finish_non_exhaustive()
    }
}

impl WpApiClient {
    pub fn new(token: String, site_id: i64, user_agent: &str, timeout: Duration) -> Self {
        let base_url = Url::parse(WPCOM_API_BASE).expect("valid default API URL");
        Self::with_base_url(token, site_id, user_agent, timeout, base_url)
    }

    pub fn with_base_url(
        token: String,
        site_id: i64,
        user_agent: &str,
        timeout: Duration,
        base_url: Url,
    ) -> Self {
        let http = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
            site_id,
        }
    }

    /// Build a client for one resolved blog. The single source of truth for
    /// blog-credential validation: fails when the blog carries no usable
    /// endpoint or token.
    pub fn for_blog(blog: &Blog, user_agent: &str, timeout: Duration) -> Result<Self> {
        if blog.api_token.trim().is_empty() {
            return Err(anyhow!("blog {} has no API token", blog.id));
        }
        let mut base = blog.api_base.trim().to_string();
        if base.is_empty() {
            return Err(anyhow!("blog {} has no API base URL", blog.id));
        }
        // Url::join treats a base without a trailing slash as a file path.
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .with_context(|| format!("blog {} has an invalid API base URL", blog.id))?;
        Ok(Self::with_base_url(
            blog.api_token.clone(),
            blog.site_id,
            user_agent,
            timeout,
            base_url,
        ))
    }

    pub fn build_get_post_request(&self, post_id: i64) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("sites/{}/posts/{}", self.site_id, post_id))
            .context("invalid API base URL")?;
        self.http
            .get(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .build()
            .context("failed to build post request")
    }

    /// Fetch one post by remote id. `Ok(None)` means the service explicitly
    /// reported that no such post exists; transport and server errors are
    /// returned as errors.
    pub async fn get_post(&self, post_id: i64) -> Result<Option<RemotePost>> {
        let request = self.build_get_post_request(post_id)?;
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach WordPress API")?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "WordPress API error: {}", body);
            return Err(anyhow!("wordpress error {}: {}", status, body));
        }

        let post = res
            .json::<RemotePost>()
            .await
            .context("invalid WordPress post JSON")?;
        Ok(Some(post))
    }

    /// Upload a local file to the blog's media endpoint and return the
    /// resulting remote media record.
    pub async fn upload_media<P: AsRef<Path>>(&self, file_path: P) -> Result<RemoteMedia> {
        let file_path = file_path.as_ref();
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid file name"))?;
        let content = fs::read(file_path)
            .await
            .with_context(|| format!("failed to read file: {}", file_path.display()))?;

        let endpoint = self
            .base_url
            .join(&format!("sites/{}/media/new", self.site_id))
            .context("invalid API base URL")?;
        let form = reqwest::multipart::Form::new().part(
            "media[]",
            reqwest::multipart::Part::bytes(content)
                .file_name(file_name.to_string())
                .mime_str(content_type_for(file_path))?,
        );

        let res = self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .multipart(form)
            .send()
            .await
            .context("failed to reach WordPress API")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("media upload failed {}: {}", status, body));
        }

        let payload: MediaUploadResponse = res
            .json()
            .await
            .context("invalid media upload response JSON")?;
        payload
            .media
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("media upload response contained no media"))
    }
}

impl PostServiceRemote for WpApiClient {
    fn get_post_with_id(&self, post_id: i64, success: PostSuccess, failure: PostFailure) {
        let client = self.clone();
        tokio::spawn(async move {
            match client.get_post(post_id).await {
                Ok(post) => success(post),
                Err(err) => failure(Some(err)),
            }
        });
    }
}

/// Default factory: one REST client per blog, endpoint and token taken from
/// the blog record.
#[derive(Debug, Clone)]
pub struct WpApiFactory {
    user_agent: String,
    timeout: Duration,
}

impl WpApiFactory {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            timeout,
        }
    }
}

impl PostServiceRemoteFactory for WpApiFactory {
    fn for_blog(&self, blog: &Blog) -> Result<Box<dyn PostServiceRemote>> {
        let client = WpApiClient::for_blog(blog, &self.user_agent, self.timeout)?;
        Ok(Box::new(client))
    }
}

pub fn content_type_for(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
