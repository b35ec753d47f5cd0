use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SlackConfig;
use crate::parsers::SlackDirectory;

pub mod events;

pub use self::events::{
    BotProfile, SignatureError, SignatureVerifier, SlackEnvelope, SlackMessageEvent,
};

const SLACK_API_BASE: &str = "https://slack.com/api";
const DEFAULT_ICON_EMOJI: &str = ":speech_balloon:";

/// Outbound side of the Slack connection as seen by the bridge.
#[async_trait]
pub trait SlackSink: Send + Sync {
    /// Posts `text` under `username`. Without an avatar the configured placeholder is used.
    async fn post_as_user(
        &self,
        channel: &str,
        text: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<String>;

    /// Whether a message with these sender ids was posted by this bridge.
    fn is_own_message(&self, user: Option<&str>, bot_id: Option<&str>, app_id: Option<&str>)
    -> bool;
}

#[derive(Debug, Clone, Default)]
struct BotIdentity {
    user_id: Option<String>,
    bot_id: Option<String>,
}

struct AuthInfo {
    user_id: String,
    bot_id: Option<String>,
    team: Option<String>,
}

pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
    app_id: Option<String>,
    placeholder: AvatarPlaceholder,
    identity: RwLock<BotIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AvatarPlaceholder {
    Url(String),
    Emoji(String),
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("irc-bridge-slack")
            .build()
            .context("failed to construct HTTP client")?;

        let placeholder = match config.default_avatar_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => AvatarPlaceholder::Url(url.to_string()),
            _ => AvatarPlaceholder::Emoji(
                config
                    .default_icon_emoji
                    .clone()
                    .filter(|emoji| !emoji.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ICON_EMOJI.to_string()),
            ),
        };

        Ok(Self {
            http,
            api_base: SLACK_API_BASE.to_string(),
            bot_token: SecretString::from(config.bot_token.clone()),
            app_id: config.app_id.clone(),
            placeholder,
            identity: RwLock::new(BotIdentity::default()),
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Verifies the bot token and records the bot's own ids for loop prevention.
    pub async fn start(&self) -> Result<()> {
        let auth = self.auth_test().await.context("slack auth.test failed")?;
        info!(
            "slack client authenticated user={} bot={} team={}",
            auth.user_id,
            auth.bot_id.as_deref().unwrap_or("-"),
            auth.team.as_deref().unwrap_or("-")
        );
        *self.identity.write() = BotIdentity {
            user_id: Some(auth.user_id),
            bot_id: auth.bot_id,
        };
        Ok(())
    }

    async fn chat_post_message(
        &self,
        channel: &str,
        text: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<String> {
        let payload = self.post_payload(channel, text, username, avatar_url);
        let response = self.slack_api_post("chat.postMessage", payload).await?;
        response
            .get("ts")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow!("chat.postMessage missing ts"))
    }

    fn post_payload(
        &self,
        channel: &str,
        text: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Value {
        let mut payload = json!({
            "channel": channel,
            "text": text,
            "username": username,
            "unfurl_links": false
        });
        match (avatar_url.filter(|url| !url.trim().is_empty()), &self.placeholder) {
            (Some(url), _) => payload["icon_url"] = json!(url),
            (None, AvatarPlaceholder::Url(url)) => payload["icon_url"] = json!(url),
            (None, AvatarPlaceholder::Emoji(emoji)) => payload["icon_emoji"] = json!(emoji),
        }
        payload
    }

    async fn auth_test(&self) -> Result<AuthInfo> {
        let value = self.slack_api_post("auth.test", json!({})).await?;
        Ok(AuthInfo {
            user_id: value
                .get("user_id")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("auth.test missing user_id"))?
                .to_string(),
            bot_id: value
                .get("bot_id")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            team: value
                .get("team")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    }

    async fn slack_api_post(&self, method: &str, payload: Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("request to Slack API method {method} failed"))?;
        decode_response(method, response).await
    }

    /// Read methods such as `users.info` only accept form or query arguments.
    async fn slack_api_get(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut url = Url::parse(&format!("{}/{method}", self.api_base))
            .with_context(|| format!("invalid Slack API url for {method}"))?;
        url.query_pairs_mut().extend_pairs(params);

        let response = self
            .http
            .get(url)
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await
            .with_context(|| format!("request to Slack API method {method} failed"))?;
        decode_response(method, response).await
    }
}

async fn decode_response(method: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let value: Value = response
        .json()
        .await
        .with_context(|| format!("Slack API method {method} returned non-JSON body"))?;

    if !status.is_success() {
        return Err(anyhow!(
            "Slack API {} failed status={} body={}",
            method,
            status,
            value
        ));
    }
    if !value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(anyhow!("Slack API {} returned ok=false: {}", method, code));
    }

    Ok(value)
}

#[async_trait]
impl SlackSink for SlackClient {
    async fn post_as_user(
        &self,
        channel: &str,
        text: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<String> {
        let ts = self
            .chat_post_message(channel, text, username, avatar_url)
            .await?;
        debug!("posted to slack channel={} ts={} as={}", channel, ts, username);
        Ok(ts)
    }

    fn is_own_message(
        &self,
        user: Option<&str>,
        bot_id: Option<&str>,
        app_id: Option<&str>,
    ) -> bool {
        let identity = self.identity.read();
        user.is_some_and(|id| {
            identity.user_id.as_deref() == Some(id) || self.app_id.as_deref() == Some(id)
        }) || bot_id.is_some_and(|id| identity.bot_id.as_deref() == Some(id))
            || app_id.is_some_and(|id| self.app_id.as_deref() == Some(id))
    }
}

#[async_trait]
impl SlackDirectory for SlackClient {
    async fn display_name(&self, user_id: &str) -> Option<String> {
        match self.slack_api_get("users.info", &[("user", user_id)]).await {
            Ok(value) => value.get("user").and_then(extract_display_name),
            Err(err) => {
                warn!("failed to fetch slack user {}: {:#}", user_id, err);
                None
            }
        }
    }

    async fn channel_name(&self, channel_id: &str) -> Option<String> {
        match self
            .slack_api_get("conversations.info", &[("channel", channel_id)])
            .await
        {
            Ok(value) => value
                .pointer("/channel/name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map(ToOwned::to_owned),
            Err(err) => {
                warn!("failed to fetch slack channel {}: {:#}", channel_id, err);
                None
            }
        }
    }
}

fn extract_display_name(user: &Value) -> Option<String> {
    ["/profile/display_name_normalized", "/profile/real_name_normalized"]
        .into_iter()
        .filter_map(|pointer| user.pointer(pointer).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
