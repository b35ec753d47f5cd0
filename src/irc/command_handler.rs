use url::Url;

use crate::parsers::parse_prefixed_command;

pub const PICTURE_USAGE: &str = "Usage: !picture <url>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcCommandOutcome {
    /// Not a bridge command; relay the line as ordinary text.
    Ignored,
    SetPicture { url: String },
    Reply(String),
}

#[derive(Debug, Clone)]
pub struct IrcCommandHandler {
    prefix: &'static str,
}

impl Default for IrcCommandHandler {
    fn default() -> Self {
        Self { prefix: "!" }
    }
}

impl IrcCommandHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, sender: &str, message: &str) -> IrcCommandOutcome {
        let parsed = match parse_prefixed_command(self.prefix, message) {
            Some(parsed) => parsed,
            None => return IrcCommandOutcome::Ignored,
        };

        match parsed.command.as_str() {
            "picture" => self.handle_picture(sender, &parsed.args),
            _ => IrcCommandOutcome::Ignored,
        }
    }

    fn handle_picture(&self, sender: &str, args: &[String]) -> IrcCommandOutcome {
        let [url] = args else {
            return IrcCommandOutcome::Reply(PICTURE_USAGE.to_string());
        };

        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                IrcCommandOutcome::SetPicture { url: url.clone() }
            }
            _ => IrcCommandOutcome::Reply(format!(
                "{sender}: that does not look like an image URL"
            )),
        }
    }
}

pub fn picture_updated(sender: &str) -> String {
    format!("{sender}: picture updated")
}

pub fn picture_failed(sender: &str) -> String {
    format!("{sender}: could not update your picture, try again later")
}
