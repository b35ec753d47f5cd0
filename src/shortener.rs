use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ShortenerConfig;

/// URLs shorter than this are returned unchanged.
pub const MIN_SHORTEN_LENGTH: usize = 32;

#[async_trait]
pub trait UrlShortener: Send + Sync {
    /// Returns the short link, or `None` when the caller should keep the original URL.
    async fn shorten(&self, url: &str) -> Option<String>;
}

#[derive(Debug, Serialize)]
struct CreateLinkRequest<'a> {
    target: &'a str,
    reuse: bool,
}

#[derive(Debug, Deserialize)]
struct CreateLinkResponse {
    link: Option<String>,
}

/// Client for a Kutt-compatible `POST /api/v2/links` endpoint.
pub struct LinkShortener {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
}

impl LinkShortener {
    pub fn new(config: &ShortenerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("irc-bridge-slack")
            .build()
            .context("failed to construct HTTP client")?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().map(SecretString::from),
        })
    }

    async fn create_link(&self, api_key: &SecretString, url: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.api_url)
            .header("X-API-KEY", api_key.expose_secret())
            .json(&CreateLinkRequest {
                target: url,
                reuse: true,
            })
            .send()
            .await
            .context("request to link shortener failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("link shortener failed status={} body={}", status, body));
        }

        let body: CreateLinkResponse = response
            .json()
            .await
            .context("link shortener returned non-JSON body")?;
        body.link
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| anyhow!("link shortener response missing link"))
    }
}

#[async_trait]
impl UrlShortener for LinkShortener {
    async fn shorten(&self, url: &str) -> Option<String> {
        if url.len() < MIN_SHORTEN_LENGTH {
            return Some(url.to_string());
        }
        let Some(api_key) = &self.api_key else {
            debug!("no shortener api key configured, keeping {}", url);
            return Some(url.to_string());
        };

        match self.create_link(api_key, url).await {
            Ok(link) => Some(link),
            Err(err) => {
                warn!("failed to shorten {}: {:#}", url, err);
                None
            }
        }
    }
}

/// Shortens `url`, falling back to the original when the shortener gives up.
pub async fn shorten_or_keep(shortener: &dyn UrlShortener, url: &str) -> String {
    shortener
        .shorten(url)
        .await
        .unwrap_or_else(|| url.to_string())
}
