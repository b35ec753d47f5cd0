use std::future::Future;
use std::ops::Range;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Action,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttachment {
    #[serde(default)]
    pub pretext: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub title_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url_private: Option<String>,
    #[serde(default)]
    pub url_private_download: Option<String>,
}

/// One message as received from either side, consumed by a single relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub sender: String,
    pub raw_text: String,
    pub attachments: Vec<MessageAttachment>,
    pub files: Vec<MessageFile>,
}

impl InboundMessage {
    pub fn from_irc(sender: &str, text: &str, kind: MessageKind) -> Self {
        Self {
            kind,
            sender: sender.to_string(),
            raw_text: text.to_string(),
            attachments: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// Slack user and channel name lookups used while rewriting mentions.
#[async_trait]
pub trait SlackDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Option<String>;

    async fn channel_name(&self, channel_id: &str) -> Option<String>;
}

/// Empty strings count as absent, matching how Slack leaves optional fields blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Replaces every match of `regex` with the output of an async resolver.
///
/// Matches are collected first, resolved concurrently, then spliced back in
/// original order, so the text being scanned is never mutated mid-scan. The
/// resolver receives the capture groups (group 1 onward, empty when unmatched).
pub async fn replace_all_async<F, Fut>(regex: &Regex, text: &str, resolve: F) -> String
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = String>,
{
    let spans: Vec<(Range<usize>, Vec<String>)> = regex
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let groups = caps
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            Some((whole.range(), groups))
        })
        .collect();

    if spans.is_empty() {
        return text.to_string();
    }

    let replacements = join_all(spans.iter().map(|(_, groups)| resolve(groups.clone()))).await;

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for ((span, _), replacement) in spans.iter().zip(replacements) {
        output.push_str(&text[cursor..span.start]);
        output.push_str(&replacement);
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);
    output
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[tokio::test]
    async fn replace_all_async_preserves_occurrence_order() {
        let regex = Regex::new(r"\{(\d+)\}").expect("regex");
        // later matches resolve first; output must still follow the input order
        let out = replace_all_async(&regex, "a{30} b{10} c{20}", |groups| async move {
            let delay: u64 = groups[0].parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            format!("<{}>", groups[0])
        })
        .await;
        assert_eq!(out, "a<30> b<10> c<20>");
    }

    #[tokio::test]
    async fn replace_all_async_without_matches_returns_input() {
        let regex = Regex::new(r"<@([A-Z0-9]+)>").expect("regex");
        let calls = Arc::new(Mutex::new(0));
        let out = replace_all_async(&regex, "nothing to see", |_| {
            let calls = calls.clone();
            async move {
                *calls.lock() += 1;
                String::new()
            }
        })
        .await;
        assert_eq!(out, "nothing to see");
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn replace_all_async_passes_empty_for_unmatched_groups() {
        let regex = Regex::new(r"<#(C\d)(?:\|([^>]*))?>").expect("regex");
        let out = replace_all_async(&regex, "<#C1> <#C2|x>", |groups| async move {
            format!("[{}:{}]", groups[0], groups[1])
        })
        .await;
        assert_eq!(out, "[C1:] [C2:x]");
    }

    #[test]
    fn non_empty_treats_blank_as_absent() {
        assert_eq!(non_empty(&Some(String::new())), None);
        assert_eq!(non_empty(&None), None);
        assert_eq!(non_empty(&Some("x".to_string())), Some("x"));
    }
}
