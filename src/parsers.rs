pub mod command_parser;
pub mod common;
pub mod irc_parser;
pub mod slack_parser;

pub use command_parser::{ParsedCommand, parse_prefixed_command};
pub use common::{
    InboundMessage, MessageAttachment, MessageFile, MessageKind, SlackDirectory,
    replace_all_async,
};
pub use irc_parser::{format_irc_action, format_irc_message};
pub use slack_parser::SlackToIrcConverter;
