use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::common::{
    InboundMessage, MessageAttachment, MessageFile, SlackDirectory, non_empty, replace_all_async,
};
use crate::shortener::{UrlShortener, shorten_or_keep};

pub const UNKNOWN_USER: &str = "UnknownUser";
pub const UNKNOWN_CHANNEL: &str = "UnknownChannel";
pub const MISSING_FILE_URL: &str = "URL not found!";

static CHANNEL_MENTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<#([A-Z0-9]+)(?:\|[^>]*)?>").expect("valid channel mention regex")
});
static USER_MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>").expect("valid user mention regex"));
static RAW_LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<((?i:https?)://[^>|]*)>").expect("valid raw link regex"));
static LINK_WITH_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<((?i:https?)://[^>|]*)\|([^>]*)>").expect("valid labeled link regex")
});
static SPECIAL_MENTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<!([a-z]+)(?:\^[A-Z0-9]+)?(?:\|([^>]*))?>").expect("valid special mention regex")
});

/// Rewrites Slack markup into the plain text posted on IRC.
pub struct SlackToIrcConverter {
    directory: Arc<dyn SlackDirectory>,
    shortener: Arc<dyn UrlShortener>,
}

impl SlackToIrcConverter {
    pub fn new(directory: Arc<dyn SlackDirectory>, shortener: Arc<dyn UrlShortener>) -> Self {
        Self {
            directory,
            shortener,
        }
    }

    /// Passes run in a fixed order: attachments, channels, users, plain links,
    /// labeled links, special mentions, entity decoding, files.
    pub async fn convert(&self, message: &InboundMessage) -> String {
        let mut text = self
            .expand_attachments(&message.raw_text, &message.attachments)
            .await;
        text = self.resolve_channel_mentions(&text).await;
        text = self.resolve_user_mentions(&text).await;
        text = self.shorten_raw_links(&text).await;
        text = self.rewrite_labeled_links(&text).await;
        text = convert_special_mentions(&text);
        text = decode_entities(&text);
        expand_files(text, &message.files)
    }

    async fn expand_attachments(&self, body: &str, attachments: &[MessageAttachment]) -> String {
        let mut text = body.to_string();
        for attachment in attachments {
            if let Some(author) = non_empty(&attachment.author_name) {
                text.push(' ');
                text.push_str(author);
            }
            if !body.is_empty() {
                text.push('\n');
            }
            let pretext = non_empty(&attachment.pretext).unwrap_or("");
            let content = non_empty(&attachment.text)
                .or_else(|| non_empty(&attachment.fallback))
                .unwrap_or("");
            text.push_str(pretext);
            text.push(' ');
            text.push_str(content);
            text.push(' ');
            if let Some(link) = non_empty(&attachment.title_link) {
                text.push_str(&shorten_or_keep(self.shortener.as_ref(), link).await);
                text.push('\n');
            }
        }
        text
    }

    async fn resolve_channel_mentions(&self, text: &str) -> String {
        replace_all_async(&CHANNEL_MENTION_REGEX, text, move |groups| async move {
            let name = self
                .directory
                .channel_name(&groups[0])
                .await
                .filter(|name| !name.is_empty());
            if name.is_none() {
                debug!("channel mention {} could not be resolved", groups[0]);
            }
            format!("#{}", name.as_deref().unwrap_or(UNKNOWN_CHANNEL))
        })
        .await
    }

    async fn resolve_user_mentions(&self, text: &str) -> String {
        replace_all_async(&USER_MENTION_REGEX, text, move |groups| async move {
            let name = self
                .directory
                .display_name(&groups[0])
                .await
                .filter(|name| !name.is_empty());
            if name.is_none() {
                debug!("user mention {} could not be resolved", groups[0]);
            }
            format!("@{}", name.as_deref().unwrap_or(UNKNOWN_USER))
        })
        .await
    }

    async fn shorten_raw_links(&self, text: &str) -> String {
        replace_all_async(&RAW_LINK_REGEX, text, move |groups| async move {
            shorten_or_keep(self.shortener.as_ref(), &groups[0]).await
        })
        .await
    }

    async fn rewrite_labeled_links(&self, text: &str) -> String {
        replace_all_async(&LINK_WITH_LABEL_REGEX, text, move |groups| async move {
            let url = shorten_or_keep(self.shortener.as_ref(), &groups[0]).await;
            format!("{} ({})", groups[1], url)
        })
        .await
    }
}

fn convert_special_mentions(text: &str) -> String {
    SPECIAL_MENTION_REGEX
        .replace_all(text, |caps: &Captures| match caps.get(2) {
            Some(label) if !label.as_str().is_empty() => label.as_str().to_string(),
            _ => format!("@{}", &caps[1]),
        })
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn expand_files(mut text: String, files: &[MessageFile]) -> String {
    for file in files {
        if !text.is_empty() {
            text.push('\n');
        }
        let name = non_empty(&file.name)
            .or_else(|| non_empty(&file.title))
            .unwrap_or("");
        let url = non_empty(&file.url_private)
            .or_else(|| non_empty(&file.url_private_download))
            .unwrap_or(MISSING_FILE_URL);
        text.push_str(&format!("FILE \"{name}\" ({url})"));
    }
    text
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use test_case::test_case;

    use super::*;
    use crate::parsers::common::MessageKind;

    #[derive(Default)]
    struct FakeDirectory {
        users: HashMap<String, String>,
        channels: HashMap<String, String>,
        calls: Mutex<usize>,
    }

    impl FakeDirectory {
        fn new(users: &[(&str, &str)], channels: &[(&str, &str)]) -> Self {
            Self {
                users: users
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                channels: channels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SlackDirectory for FakeDirectory {
        async fn display_name(&self, user_id: &str) -> Option<String> {
            *self.calls.lock() += 1;
            self.users.get(user_id).cloned()
        }

        async fn channel_name(&self, channel_id: &str) -> Option<String> {
            *self.calls.lock() += 1;
            self.channels.get(channel_id).cloned()
        }
    }

    /// Maps long URLs to `https://sho.rt/<n>` deterministically; `None` for `fail` URLs.
    struct FakeShortener;

    #[async_trait]
    impl UrlShortener for FakeShortener {
        async fn shorten(&self, url: &str) -> Option<String> {
            if url.contains("fail") {
                return None;
            }
            if url.len() < crate::shortener::MIN_SHORTEN_LENGTH {
                return Some(url.to_string());
            }
            Some(format!("https://sho.rt/{}", url.len()))
        }
    }

    fn converter(directory: FakeDirectory) -> SlackToIrcConverter {
        SlackToIrcConverter::new(Arc::new(directory), Arc::new(FakeShortener))
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            kind: MessageKind::Text,
            sender: "U1".to_string(),
            raw_text: text.to_string(),
            attachments: Vec::new(),
            files: Vec::new(),
        }
    }

    fn default_directory() -> FakeDirectory {
        FakeDirectory::new(&[("U1", "Alice")], &[("C1", "general")])
    }

    #[test_case("hi <@U1>", "hi @Alice" ; "known user")]
    #[test_case("hi <@U2>", "hi @UnknownUser" ; "unknown user")]
    #[test_case("<@U1|alice> and <@U1>", "@Alice and @Alice" ; "labeled user mention")]
    #[test_case("see <#C1|ignored>", "see #general" ; "labeled channel")]
    #[test_case("see <#C2>", "see #UnknownChannel" ; "unknown channel")]
    #[test_case("<!here> <!channel> <!everyone>", "@here @channel @everyone" ; "special mentions")]
    #[test_case("ping <!subteam^S123|@devs>", "ping @devs" ; "user group")]
    #[test_case("a &lt;b&gt; &amp;amp;", "a <b> &amp;" ; "entities decoded once")]
    #[test_case("<http://x.io|x>", "x (http://x.io)" ; "short labeled link")]
    #[test_case("<https://x.io>", "https://x.io" ; "short raw link")]
    fn converts_markup(input: &str, expected: &str) {
        let converter = converter(default_directory());
        let out = tokio_test::block_on(converter.convert(&message(input)));
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn empty_lookup_result_falls_back_to_unknown() {
        let converter = converter(FakeDirectory::new(&[("U2", "")], &[("C2", "")]));
        let out = converter.convert(&message("<@U2> in <#C2>")).await;
        assert_eq!(out, "@UnknownUser in #UnknownChannel");
    }

    #[tokio::test]
    async fn long_links_are_shortened() {
        let converter = converter(default_directory());
        let long = "https://example.com/some/really/long/path";
        let out = converter
            .convert(&message(&format!("<{long}> and <{long}|docs>")))
            .await;
        let short = format!("https://sho.rt/{}", long.len());
        assert_eq!(out, format!("{short} and docs ({short})"));
    }

    #[tokio::test]
    async fn shortener_failure_keeps_original_url() {
        let converter = converter(default_directory());
        let long = "https://example.com/this/will/fail/to/shorten";
        let out = converter.convert(&message(&format!("<{long}|docs>"))).await;
        assert_eq!(out, format!("docs ({long})"));
    }

    #[tokio::test]
    async fn labeled_link_pipe_is_not_a_channel_label() {
        let converter = converter(default_directory());
        let out = converter
            .convert(&message("<#C1> <http://a.io/?x=1|pipe|label>"))
            .await;
        assert_eq!(out, "#general pipe|label (http://a.io/?x=1)");
    }

    #[tokio::test]
    async fn single_file_with_empty_body_has_no_leading_newline() {
        let converter = converter(default_directory());
        let mut msg = message("");
        msg.files.push(MessageFile {
            name: Some("cat.png".to_string()),
            url_private: Some("http://x/cat.png".to_string()),
            ..MessageFile::default()
        });
        assert_eq!(
            converter.convert(&msg).await,
            "FILE \"cat.png\" (http://x/cat.png)"
        );
    }

    #[tokio::test]
    async fn file_fallbacks_apply_in_order() {
        let converter = converter(default_directory());
        let mut msg = message("look");
        msg.files.push(MessageFile {
            title: Some("Screenshot".to_string()),
            url_private_download: Some("http://x/dl".to_string()),
            ..MessageFile::default()
        });
        msg.files.push(MessageFile::default());
        assert_eq!(
            converter.convert(&msg).await,
            "look\nFILE \"Screenshot\" (http://x/dl)\nFILE \"\" (URL not found!)"
        );
    }

    #[tokio::test]
    async fn attachments_expand_with_separators() {
        let converter = converter(default_directory());
        let mut msg = message("deploy");
        msg.attachments.push(MessageAttachment {
            author_name: Some("ci".to_string()),
            pretext: Some("Build".to_string()),
            text: Some("passed".to_string()),
            fallback: Some("ignored".to_string()),
            title_link: Some("http://ci.io/1".to_string()),
        });
        msg.attachments.push(MessageAttachment {
            fallback: Some("fallback only".to_string()),
            ..MessageAttachment::default()
        });
        assert_eq!(
            converter.convert(&msg).await,
            "deploy ci\nBuild passed http://ci.io/1\n\n fallback only "
        );
    }

    #[tokio::test]
    async fn attachment_without_body_gets_no_newline() {
        let converter = converter(default_directory());
        let mut msg = message("");
        msg.attachments.push(MessageAttachment {
            text: Some("<@U1> approved".to_string()),
            ..MessageAttachment::default()
        });
        assert_eq!(converter.convert(&msg).await, " @Alice approved ");
    }

    #[tokio::test]
    async fn empty_message_yields_empty_text() {
        let directory = default_directory();
        let converter = converter(directory);
        assert_eq!(converter.convert(&message("")).await, "");
    }

    #[tokio::test]
    async fn lookups_run_once_per_occurrence() {
        let directory = Arc::new(default_directory());
        let converter = SlackToIrcConverter::new(directory.clone(), Arc::new(FakeShortener));
        converter
            .convert(&message("<@U1> <@U1> <#C1> plain"))
            .await;
        assert_eq!(*directory.calls.lock(), 3);
    }
}
