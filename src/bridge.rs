use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::BridgeBinding;
use crate::identity::IdentityCache;
use crate::irc::command_handler::{picture_failed, picture_updated};
use crate::irc::{IrcCommandHandler, IrcCommandOutcome, IrcEvent, IrcSink};
use crate::parsers::slack_parser::UNKNOWN_USER;
use crate::parsers::{
    InboundMessage, MessageKind, SlackDirectory, SlackToIrcConverter, format_irc_action,
    format_irc_message,
};
use crate::shortener::UrlShortener;
use crate::slack::{SlackMessageEvent, SlackSink};

pub mod logic;

use self::logic::{format_irc_actions, format_irc_lines, is_own_irc_sender, preview_text};

/// Routes messages between the bound IRC channel and the bound Slack channel.
/// Holds no per-message state; every relay runs independently.
pub struct BridgeCore {
    binding: Arc<BridgeBinding>,
    irc: Arc<dyn IrcSink>,
    slack: Arc<dyn SlackSink>,
    directory: Arc<dyn SlackDirectory>,
    identity: Arc<IdentityCache>,
    converter: SlackToIrcConverter,
    irc_command_handler: IrcCommandHandler,
    message_format: String,
}

impl BridgeCore {
    pub fn new(
        binding: Arc<BridgeBinding>,
        irc: Arc<dyn IrcSink>,
        slack: Arc<dyn SlackSink>,
        directory: Arc<dyn SlackDirectory>,
        shortener: Arc<dyn UrlShortener>,
        identity: Arc<IdentityCache>,
        message_format: String,
    ) -> Self {
        Self {
            converter: SlackToIrcConverter::new(directory.clone(), shortener),
            irc_command_handler: IrcCommandHandler::new(),
            binding,
            irc,
            slack,
            directory,
            identity,
            message_format,
        }
    }

    /// Consumes IRC events until the connection task drops its sender.
    pub async fn run_irc_events(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<IrcEvent>) {
        while let Some(event) = events.recv().await {
            let bridge = self.clone();
            tokio::spawn(async move {
                bridge.handle_irc_event(event).await;
            });
        }
        debug!("irc event stream closed");
    }

    pub async fn handle_irc_event(&self, event: IrcEvent) {
        match event {
            IrcEvent::Joined { channel } => {
                info!("bridge active irc={} slack={}", channel, self.binding.slack_channel);
            }
            IrcEvent::ChannelMessage { from, text } => {
                self.handle_irc_message(&from, &text, MessageKind::Text)
                    .await;
            }
            IrcEvent::ChannelAction { from, text } => {
                self.handle_irc_message(&from, &text, MessageKind::Action)
                    .await;
            }
            IrcEvent::PrivateMessage { from, text } => {
                info!(
                    "ignoring private irc message from={} text={}",
                    from,
                    preview_text(&text)
                );
            }
        }
    }

    async fn handle_irc_message(&self, from: &str, text: &str, kind: MessageKind) {
        if is_own_irc_sender(&self.irc.nickname(), from) {
            debug!("skipping own irc message");
            return;
        }

        if kind == MessageKind::Text {
            match self.irc_command_handler.handle(from, text) {
                IrcCommandOutcome::Ignored => {}
                IrcCommandOutcome::SetPicture { url } => {
                    let reply = if self.identity.set_avatar_url(from, &url).await {
                        picture_updated(from)
                    } else {
                        picture_failed(from)
                    };
                    self.irc.say(&self.binding.irc_channel, &reply);
                    return;
                }
                IrcCommandOutcome::Reply(reply) => {
                    warn!("rejected irc command from={} text={}", from, preview_text(text));
                    self.irc.say(&self.binding.irc_channel, &reply);
                    return;
                }
            }
        }

        self.relay_to_slack(&InboundMessage::from_irc(from, text, kind))
            .await;
    }

    async fn relay_to_slack(&self, message: &InboundMessage) {
        if message.raw_text.trim().is_empty() {
            debug!("skipping empty irc line from={}", message.sender);
            return;
        }
        let text = match message.kind {
            MessageKind::Text => format_irc_message(&message.raw_text),
            MessageKind::Action => format_irc_action(&message.raw_text),
        };

        let avatar = self.identity.get_avatar_url(&message.sender).await;
        if let Err(err) = self
            .slack
            .post_as_user(
                &self.binding.slack_channel,
                &text,
                &message.sender,
                avatar.as_deref(),
            )
            .await
        {
            error!(
                "failed to relay irc message from={} to slack: {:#}",
                message.sender, err
            );
        }
    }

    /// Entry point for the inner `event` of an Events API callback.
    pub async fn handle_slack_event(&self, event: &Value) {
        match SlackMessageEvent::from_value(event) {
            Some(message) => self.handle_slack_message(message).await,
            None => debug!("ignoring undecodable slack event"),
        }
    }

    pub async fn handle_slack_message(&self, event: SlackMessageEvent) {
        if event.channel.as_deref() != Some(self.binding.slack_channel.as_str()) {
            return;
        }
        if !event.is_relayable() {
            debug!(
                "ignoring slack event type={} subtype={:?}",
                event.event_type, event.subtype
            );
            return;
        }
        if self.slack.is_own_message(
            event.user.as_deref(),
            event.bot_id.as_deref(),
            event.sender_app_id(),
        ) {
            debug!("skipping own slack message ts={:?}", event.ts);
            return;
        }

        let sender = self.resolve_sender(&event).await;
        let inbound = event.to_inbound(sender);
        let text = self.converter.convert(&inbound).await;
        self.relay_to_irc(&inbound, &text);
    }

    async fn resolve_sender(&self, event: &SlackMessageEvent) -> String {
        if let Some(user) = event.user.as_deref().filter(|user| !user.is_empty())
            && let Some(name) = self.directory.display_name(user).await
        {
            return name;
        }
        event.fallback_sender().unwrap_or(UNKNOWN_USER).to_string()
    }

    fn relay_to_irc(&self, message: &InboundMessage, text: &str) {
        let channel = &self.binding.irc_channel;
        let delivered = match message.kind {
            MessageKind::Text => format_irc_lines(&self.message_format, &message.sender, text)
                .iter()
                .all(|line| self.irc.say(channel, line)),
            MessageKind::Action => format_irc_actions(&message.sender, text)
                .iter()
                .all(|line| self.irc.action(channel, line)),
        };
        if !delivered {
            warn!(
                "slack message from={} was not delivered to irc",
                message.sender
            );
        }
    }
}
