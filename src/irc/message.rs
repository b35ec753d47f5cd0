use thiserror::Error;

const CTCP_DELIM: char = '\x01';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IrcParseError {
    #[error("empty line")]
    Empty,

    #[error("missing command in line: {0}")]
    MissingCommand(String),
}

/// One parsed protocol line: `[@tags] [:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Result<Self, IrcParseError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            return Err(IrcParseError::Empty);
        }

        if rest.starts_with('@') {
            rest = rest
                .split_once(' ')
                .map(|(_, tail)| tail.trim_start())
                .unwrap_or("");
        }

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
            rest = tail.trim_start();
            Some(prefix.to_string())
        } else {
            None
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let (head, trailing) = match head.strip_prefix(':') {
            // line of the form `COMMAND :trailing` with nothing before the colon
            Some(only_trailing) if trailing.is_none() => ("", Some(only_trailing)),
            _ => (head, trailing),
        };

        let mut words = head.split_whitespace();
        let command = words
            .next()
            .ok_or_else(|| IrcParseError::MissingCommand(line.to_string()))?
            .to_ascii_uppercase();
        let mut params: Vec<String> = words.map(ToString::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Ok(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nickname part of a `nick!user@host` prefix.
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

/// Returns the body of a CTCP ACTION (`/me`) payload.
pub fn ctcp_action(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    let body = inner.strip_prefix("ACTION")?;
    Some(body.strip_prefix(' ').unwrap_or(body))
}

pub fn is_ctcp(text: &str) -> bool {
    text.starts_with(CTCP_DELIM)
}

pub fn nick(nickname: &str) -> String {
    format!("NICK {nickname}")
}

pub fn user(username: &str, realname: &str) -> String {
    format!("USER {username} 0 * :{realname}")
}

pub fn pong(token: &str) -> String {
    format!("PONG :{token}")
}

pub fn privmsg(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :{text}")
}

pub fn action(target: &str, text: &str) -> String {
    privmsg(target, &format!("{CTCP_DELIM}ACTION {text}{CTCP_DELIM}"))
}

pub fn identify(password: &str) -> String {
    privmsg("NickServ", &format!("IDENTIFY {password}"))
}

pub fn mode(target: &str, flags: &str) -> String {
    format!("MODE {target} {flags}")
}

pub fn join(channel: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("JOIN {channel} {key}"),
        None => format!("JOIN {channel}"),
    }
}

pub fn quit(reason: &str) -> String {
    format!("QUIT :{reason}")
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(
        ":alice!a@host PRIVMSG #rust :hello there",
        Some("alice!a@host"), "PRIVMSG", &["#rust", "hello there"] ;
        "privmsg with trailing"
    )]
    #[test_case("PING :irc.example.org", None, "PING", &["irc.example.org"] ; "ping")]
    #[test_case(
        ":srv 001 bridgebot :Welcome to IRC",
        Some("srv"), "001", &["bridgebot", "Welcome to IRC"] ;
        "numeric"
    )]
    #[test_case(
        "@time=2024-01-01T00:00:00Z :bob!b@h JOIN #rust",
        Some("bob!b@h"), "JOIN", &["#rust"] ;
        "tags are skipped"
    )]
    #[test_case(":bob!b@h JOIN :#rust", Some("bob!b@h"), "JOIN", &["#rust"] ; "join with trailing channel")]
    #[test_case("privmsg #c :a :b", None, "PRIVMSG", &["#c", "a :b"] ; "colon inside trailing")]
    fn parses_lines(line: &str, prefix: Option<&str>, command: &str, params: &[&str]) {
        let message = IrcMessage::parse(line).expect("parse");
        assert_eq!(message.prefix.as_deref(), prefix);
        assert_eq!(message.command, command);
        assert_eq!(message.params, params);
    }

    #[test]
    fn empty_line_is_rejected() {
        assert_eq!(IrcMessage::parse("  \r\n"), Err(IrcParseError::Empty));
    }

    #[test]
    fn prefix_only_line_is_rejected() {
        assert!(matches!(
            IrcMessage::parse(":server.only"),
            Err(IrcParseError::MissingCommand(_))
        ));
    }

    #[test]
    fn source_nick_strips_user_and_host() {
        let message = IrcMessage::parse(":carol!c@example.org PRIVMSG #c :x").expect("parse");
        assert_eq!(message.source_nick(), Some("carol"));
        let server = IrcMessage::parse(":irc.example.org NOTICE * :hi").expect("parse");
        assert_eq!(server.source_nick(), Some("irc.example.org"));
    }

    #[test_case("\x01ACTION waves\x01", Some("waves") ; "action")]
    #[test_case("\x01ACTION waves", Some("waves") ; "unterminated action")]
    #[test_case("\x01ACTION\x01", Some("") ; "empty action")]
    #[test_case("\x01VERSION\x01", None ; "other ctcp")]
    #[test_case("ACTION waves", None ; "not ctcp")]
    fn detects_actions(text: &str, expected: Option<&str>) {
        assert_eq!(ctcp_action(text), expected);
    }

    #[test]
    fn builds_outbound_commands() {
        assert_eq!(join("#rust", Some("key")), "JOIN #rust key");
        assert_eq!(join("#rust", None), "JOIN #rust");
        assert_eq!(identify("pw"), "PRIVMSG NickServ :IDENTIFY pw");
        assert_eq!(mode("bot", "+B"), "MODE bot +B");
        assert_eq!(action("#c", "waves"), "PRIVMSG #c :\x01ACTION waves\x01");
        assert_eq!(user("bot", "Slack bridge"), "USER bot 0 * :Slack bridge");
    }
}
