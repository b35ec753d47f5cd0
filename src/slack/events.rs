use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::parsers::{InboundMessage, MessageAttachment, MessageFile, MessageKind};

type HmacSha256 = Hmac<Sha256>;

/// Requests older than this are rejected as possible replays.
pub const SIGNATURE_TOLERANCE_SECONDS: u64 = 300;

const RELAYED_SUBTYPES: &[&str] = &["file_share", "bot_message", "me_message", "thread_broadcast"];

/// Outer payload posted to the Events API endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackMessageEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,
    #[serde(default)]
    pub files: Vec<MessageFile>,
    #[serde(default)]
    pub bot_profile: Option<BotProfile>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl SlackMessageEvent {
    pub fn from_value(event: &Value) -> Option<Self> {
        Self::deserialize(event).ok()
    }

    /// Plain messages and the subtypes that still carry user-visible content.
    pub fn is_relayable(&self) -> bool {
        if self.event_type != "message" {
            return false;
        }
        match self.subtype.as_deref() {
            None => true,
            Some(subtype) => RELAYED_SUBTYPES.contains(&subtype),
        }
    }

    pub fn kind(&self) -> MessageKind {
        if self.subtype.as_deref() == Some("me_message") {
            MessageKind::Action
        } else {
            MessageKind::Text
        }
    }

    /// App id from either the event itself or the posting bot's profile.
    pub fn sender_app_id(&self) -> Option<&str> {
        self.app_id
            .as_deref()
            .or_else(|| self.bot_profile.as_ref().and_then(|p| p.app_id.as_deref()))
    }

    /// Name to show when the user's display name cannot be resolved.
    pub fn fallback_sender(&self) -> Option<&str> {
        let candidates = [
            self.bot_profile.as_ref().and_then(|p| p.name.as_deref()),
            self.username.as_deref(),
            self.user.as_deref(),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
    }

    pub fn to_inbound(&self, sender: String) -> InboundMessage {
        InboundMessage {
            kind: self.kind(),
            sender,
            raw_text: self.text.clone().unwrap_or_default(),
            attachments: self.attachments.clone(),
            files: self.files.clone(),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),

    #[error("invalid request timestamp")]
    InvalidTimestamp,

    #[error("request timestamp outside of tolerance")]
    Expired,

    #[error("malformed signature")]
    Malformed,

    #[error("signature mismatch")]
    Mismatch,
}

/// Checks `X-Slack-Signature` against the app's signing secret.
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance_seconds: u64,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_seconds: SIGNATURE_TOLERANCE_SECONDS,
        }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        body: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp =
            timestamp.ok_or(SignatureError::MissingHeader("X-Slack-Request-Timestamp"))?;
        let signature = signature.ok_or(SignatureError::MissingHeader("X-Slack-Signature"))?;

        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.abs_diff(sent_at) > self.tolerance_seconds {
            return Err(SignatureError::Expired);
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|digest| hex::decode(digest).ok())
            .ok_or(SignatureError::Malformed)?;

        self.mac_for(timestamp.trim(), body)?
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    fn mac_for(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }

    #[cfg(test)]
    pub(crate) fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let mac = self.mac_for(timestamp, body).expect("hmac accepts any key");
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }
}
