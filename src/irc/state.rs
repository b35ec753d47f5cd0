use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::message::{self, IrcMessage};

/// Handshake progress for the single bridged channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Registering,
    Authenticating,
    SettingMode,
    Joining,
    Joined,
}

impl ConnectionState {
    pub fn is_joined(self) -> bool {
        self == Self::Joined
    }
}

/// Something the bridge cares about, lifted out of the raw protocol traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    Joined { channel: String },
    ChannelMessage { from: String, text: String },
    ChannelAction { from: String, text: String },
    PrivateMessage { from: String, text: String },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub outbound: Vec<String>,
    pub event: Option<IrcEvent>,
}

impl Step {
    fn send(line: String) -> Self {
        Self {
            outbound: vec![line],
            event: None,
        }
    }

    fn event(event: IrcEvent) -> Self {
        Self {
            outbound: Vec::new(),
            event: Some(event),
        }
    }
}

#[derive(Debug)]
pub struct SessionSettings {
    pub nickname: String,
    pub realname: String,
    pub password: Option<SecretString>,
    pub user_mode: String,
    pub channel: String,
    pub channel_key: Option<String>,
}

/// Registration and join state machine. It never touches a socket: every
/// inbound message yields the lines to write back plus an optional event.
#[derive(Debug)]
pub struct Session {
    settings: SessionSettings,
    nickname: String,
    state: ConnectionState,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            nickname: settings.nickname.clone(),
            settings,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Lines that open a fresh connection.
    pub fn connect(&mut self) -> Vec<String> {
        self.nickname = self.settings.nickname.clone();
        self.state = ConnectionState::Registering;
        vec![
            message::nick(&self.nickname),
            message::user(&self.settings.nickname, &self.settings.realname),
        ]
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    pub fn handle(&mut self, msg: &IrcMessage) -> Step {
        match msg.command.as_str() {
            "PING" => Step::send(message::pong(msg.trailing().unwrap_or_default())),
            "001" => self.on_welcome(msg),
            "433" => self.on_nick_in_use(),
            "471" | "473" | "474" | "475" => {
                warn!(
                    "cannot join {}: {} ({})",
                    msg.param(1).unwrap_or(&self.settings.channel),
                    msg.trailing().unwrap_or_default(),
                    msg.command
                );
                Step::default()
            }
            "NICK" => {
                if msg.source_nick() == Some(self.nickname.as_str())
                    && let Some(new_nick) = msg.param(0)
                {
                    info!("nickname changed from {} to {}", self.nickname, new_nick);
                    self.nickname = new_nick.to_string();
                }
                Step::default()
            }
            "JOIN" => self.on_join(msg),
            "PRIVMSG" => self.on_privmsg(msg),
            "ERROR" => {
                warn!("server error: {}", msg.trailing().unwrap_or_default());
                Step::default()
            }
            _ => Step::default(),
        }
    }

    fn on_welcome(&mut self, msg: &IrcMessage) -> Step {
        if let Some(assigned) = msg.param(0) {
            self.nickname = assigned.to_string();
        }
        info!("registered on IRC as {}", self.nickname);

        let mut outbound = Vec::with_capacity(3);
        self.state = ConnectionState::Authenticating;
        if let Some(password) = &self.settings.password {
            outbound.push(message::identify(password.expose_secret()));
        }

        self.state = ConnectionState::SettingMode;
        if !self.settings.user_mode.is_empty() {
            outbound.push(message::mode(&self.nickname, &self.settings.user_mode));
        }

        self.state = ConnectionState::Joining;
        outbound.push(message::join(
            &self.settings.channel,
            self.settings.channel_key.as_deref(),
        ));

        Step {
            outbound,
            event: None,
        }
    }

    fn on_nick_in_use(&mut self) -> Step {
        if self.state != ConnectionState::Registering {
            return Step::default();
        }
        let previous = std::mem::take(&mut self.nickname);
        self.nickname = format!("{previous}_");
        warn!("nickname {} is in use, trying {}", previous, self.nickname);
        Step::send(message::nick(&self.nickname))
    }

    fn on_join(&mut self, msg: &IrcMessage) -> Step {
        let channel = msg.param(0).unwrap_or_default();
        if msg.source_nick() != Some(self.nickname.as_str())
            || !channel.eq_ignore_ascii_case(&self.settings.channel)
        {
            return Step::default();
        }
        self.state = ConnectionState::Joined;
        info!("joined {}", channel);
        Step::event(IrcEvent::Joined {
            channel: channel.to_string(),
        })
    }

    fn on_privmsg(&self, msg: &IrcMessage) -> Step {
        let (Some(from), Some(target), Some(text)) =
            (msg.source_nick(), msg.param(0), msg.param(1))
        else {
            return Step::default();
        };
        let from = from.to_string();

        if target.eq_ignore_ascii_case(&self.nickname) {
            return Step::event(IrcEvent::PrivateMessage {
                from,
                text: text.to_string(),
            });
        }
        if !self.state.is_joined() || !target.eq_ignore_ascii_case(&self.settings.channel) {
            debug!("ignoring message to {} in state {:?}", target, self.state);
            return Step::default();
        }

        if let Some(action) = message::ctcp_action(text) {
            return Step::event(IrcEvent::ChannelAction {
                from,
                text: action.to_string(),
            });
        }
        if message::is_ctcp(text) {
            return Step::default();
        }
        Step::event(IrcEvent::ChannelMessage {
            from,
            text: text.to_string(),
        })
    }
}
