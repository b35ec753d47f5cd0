use once_cell::sync::Lazy;
use regex::Regex;

static FORMATTING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\x03(?:\d{1,2}(?:,\d{1,2})?)?|\x04(?:[0-9A-Fa-f]{6}(?:,[0-9A-Fa-f]{6})?)?|[\x02\x0F\x11\x16\x1D\x1E\x1F]",
    )
    .expect("valid irc formatting regex")
});

/// Removes mIRC bold/color/italic/underline/reverse/reset control codes.
pub fn strip_irc_formatting(text: &str) -> String {
    FORMATTING_REGEX.replace_all(text, "").to_string()
}

pub fn escape_slack_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Plain channel line → Slack message text.
pub fn format_irc_message(text: &str) -> String {
    escape_slack_text(&strip_irc_formatting(text))
}

/// `/me` line → Slack italics.
pub fn format_irc_action(text: &str) -> String {
    format!("_{}_", format_irc_message(text))
}
