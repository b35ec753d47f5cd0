use crate::utils::formatting::apply_pattern_string;

const MAX_PREVIEW_CHARS: usize = 120;

pub(crate) fn preview_text(value: &str) -> String {
    let mut chars = value.chars();
    let preview: String = chars.by_ref().take(MAX_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}…")
    } else {
        preview
    }
}

/// IRC nicknames are matched exactly; a nick that merely contains ours is someone else.
pub(crate) fn is_own_irc_sender(own_nickname: &str, sender: &str) -> bool {
    !own_nickname.is_empty() && own_nickname == sender
}

/// Non-blank lines of a converted Slack message, trailing whitespace removed.
pub(crate) fn relay_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
}

/// One templated IRC line per non-blank line of `text`.
pub(crate) fn format_irc_lines(template: &str, username: &str, text: &str) -> Vec<String> {
    relay_lines(text)
        .map(|line| apply_pattern_string(template, &[("username", username), ("text", line)]))
        .collect()
}

/// `/me` lines carry the sender in front since the bot itself performs the action.
pub(crate) fn format_irc_actions(username: &str, text: &str) -> Vec<String> {
    relay_lines(text)
        .map(|line| format!("{username} {line}"))
        .collect()
}
