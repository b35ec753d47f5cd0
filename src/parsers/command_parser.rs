#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: String,
    pub args: Vec<String>,
}

pub fn parse_prefixed_command(prefix: &str, message: &str) -> Option<ParsedCommand> {
    let trimmed = message.trim();
    if !trimmed.starts_with(prefix) {
        return None;
    }

    let remainder = trimmed[prefix.len()..].trim();
    if remainder.is_empty() {
        return None;
    }

    let mut segments = remainder.split_whitespace();
    let command = segments.next()?.to_string();
    let args = segments.map(ToString::to_string).collect();

    Some(ParsedCommand { command, args })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{ParsedCommand, parse_prefixed_command};

    #[test_case("hello !picture x" ; "prefix not at start")]
    #[test_case("!" ; "bare prefix")]
    #[test_case("   " ; "blank line")]
    fn parse_prefixed_command_rejects(message: &str) {
        assert_eq!(parse_prefixed_command("!", message), None);
    }

    #[test]
    fn parse_prefixed_command_splits_command_and_args() {
        assert_eq!(
            parse_prefixed_command("!", "!picture http://img/carol.png"),
            Some(ParsedCommand {
                command: "picture".to_string(),
                args: vec!["http://img/carol.png".to_string()]
            })
        );
    }

    #[test]
    fn parse_prefixed_command_keeps_command_case() {
        let parsed = parse_prefixed_command("!", "  !PICTURE  ").expect("command");
        assert_eq!(parsed.command, "PICTURE");
        assert!(parsed.args.is_empty());
    }
}
