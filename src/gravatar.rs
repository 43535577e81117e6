//! Gravatar profile lookup for an email address.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GravatarError {
    #[error("no gravatar profile for that address")]
    ProfileNotFound,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GravatarProfile {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default)]
    pub preferred_username: String,
    /// The API names this `avatar_url`.
    #[serde(rename = "avatar_url", default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct GravatarClient {
    http: Client,
    base_url: Url,
}

/// Gravatar addresses profiles by the lowercased, trimmed email's SHA-256.
pub fn email_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{:x}", digest)
}

impl GravatarClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid Gravatar base URL")?;
        let http = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Ok(Self { http, base_url })
    }

    pub fn build_profile_request(&self, email: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("v3/profiles/{}", email_hash(email)))
            .context("invalid Gravatar base URL")?;
        self.http
            .get(endpoint)
            .build()
            .context("failed to build Gravatar request")
    }

    pub async fn fetch_profile(&self, email: &str) -> Result<GravatarProfile> {
        let request = self.build_profile_request(email)?;
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Gravatar")?;

        if res.status() == StatusCode::NOT_FOUND {
            return Err(GravatarError::ProfileNotFound.into());
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("gravatar error {}: {}", status, body));
        }

        res.json::<GravatarProfile>()
            .await
            .context("invalid Gravatar profile JSON")
    }
}
