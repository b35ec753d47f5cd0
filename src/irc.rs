use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{BridgeBinding, IrcConfig};
use crate::utils::formatting::split_on_char_boundary;

pub mod codec;
pub mod command_handler;
pub mod message;
pub mod state;

pub use self::command_handler::{IrcCommandHandler, IrcCommandOutcome};
pub use self::state::{ConnectionState, IrcEvent};

use self::codec::new_irc_connection;
use self::message::IrcMessage;
use self::state::{Session, SessionSettings};

const INITIAL_RECONNECT_SECONDS: u64 = 2;
const MAX_RECONNECT_SECONDS: u64 = 300;
/// Leaves room for `:nick!user@host PRIVMSG #channel :` inside the 512-byte line.
const MAX_TEXT_BYTES: usize = 400;

/// Outbound side of the IRC connection as seen by the bridge.
pub trait IrcSink: Send + Sync {
    /// Nickname currently accepted by the server.
    fn nickname(&self) -> String;

    fn say(&self, channel: &str, text: &str) -> bool;

    fn action(&self, channel: &str, text: &str) -> bool;
}

pub struct IrcClient {
    address: String,
    port: u16,
    reconnect: bool,
    session: Mutex<Session>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl IrcClient {
    pub fn new(config: &IrcConfig, binding: &BridgeBinding) -> Self {
        let settings = SessionSettings {
            nickname: config.nickname.clone(),
            realname: config
                .realname
                .clone()
                .unwrap_or_else(|| config.nickname.clone()),
            password: config.password.clone().map(SecretString::from),
            user_mode: config.user_mode.clone(),
            channel: binding.irc_channel.clone(),
            channel_key: binding.irc_channel_key.clone(),
        };

        Self {
            address: config.address.clone(),
            port: config.port,
            reconnect: config.reconnect,
            session: Mutex::new(Session::new(settings)),
            outbound: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    /// Connects and pumps the connection until it ends. The first connection
    /// attempt must succeed; later drops are retried when reconnect is enabled.
    pub async fn run(&self, events: mpsc::UnboundedSender<IrcEvent>) -> Result<()> {
        let mut retry_seconds = INITIAL_RECONNECT_SECONDS;
        let mut connected_once = false;

        loop {
            match TcpStream::connect((self.address.as_str(), self.port)).await {
                Ok(stream) => {
                    connected_once = true;
                    retry_seconds = INITIAL_RECONNECT_SECONDS;
                    info!("connected to irc server {}:{}", self.address, self.port);
                    match self.drive(stream, &events).await {
                        Ok(()) => info!("irc connection closed"),
                        Err(err) => error!("irc connection failed: {:#}", err),
                    }
                }
                Err(err) if !connected_once => {
                    return Err(err).with_context(|| {
                        format!("failed to connect to {}:{}", self.address, self.port)
                    });
                }
                Err(err) => warn!("irc reconnect to {} failed: {}", self.address, err),
            }

            self.session.lock().disconnect();
            *self.outbound.lock() = None;

            if !self.reconnect || events.is_closed() {
                return Ok(());
            }
            warn!("reconnecting to irc in {} seconds", retry_seconds);
            tokio::time::sleep(Duration::from_secs(retry_seconds)).await;
            retry_seconds = (retry_seconds * 2).min(MAX_RECONNECT_SECONDS);
        }
    }

    async fn drive(
        &self,
        stream: TcpStream,
        events: &mpsc::UnboundedSender<IrcEvent>,
    ) -> Result<()> {
        let mut connection = new_irc_connection(stream);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.outbound.lock() = Some(tx);

        let greeting = self.session.lock().connect();
        for line in greeting {
            connection.send(line).await?;
        }

        loop {
            tokio::select! {
                inbound = connection.next() => {
                    let Some(line) = inbound else {
                        return Ok(());
                    };
                    let line = line.context("failed to read from irc server")?;
                    let msg = match IrcMessage::parse(&line) {
                        Ok(msg) => msg,
                        Err(err) => {
                            debug!("skipping unparseable irc line: {}", err);
                            continue;
                        }
                    };

                    let step = self.session.lock().handle(&msg);
                    for reply in step.outbound {
                        connection.send(reply).await?;
                    }
                    if let Some(event) = step.event
                        && events.send(event).is_err()
                    {
                        return Ok(());
                    }
                }
                Some(line) = rx.recv() => {
                    connection.send(line).await?;
                }
            }
        }
    }

    /// Queues raw lines on the live connection; refuses when the channel is not joined.
    fn enqueue(&self, lines: Vec<String>) -> bool {
        let (joined, nickname) = {
            let session = self.session.lock();
            (session.state().is_joined(), session.nickname().to_string())
        };
        if !joined {
            warn!("dropping {} outbound irc line(s) for {}: not joined", lines.len(), nickname);
            return false;
        }

        let guard = self.outbound.lock();
        let Some(tx) = guard.as_ref() else {
            warn!("dropping outbound irc line(s): no connection");
            return false;
        };
        lines.into_iter().all(|line| tx.send(line).is_ok())
    }

    pub fn quit(&self, reason: &str) {
        if let Some(tx) = self.outbound.lock().as_ref() {
            let _ = tx.send(message::quit(reason));
        }
    }
}

impl IrcSink for IrcClient {
    fn nickname(&self) -> String {
        self.session.lock().nickname().to_string()
    }

    fn say(&self, channel: &str, text: &str) -> bool {
        let lines = split_on_char_boundary(text, MAX_TEXT_BYTES)
            .into_iter()
            .map(|chunk| message::privmsg(channel, chunk))
            .collect();
        self.enqueue(lines)
    }

    fn action(&self, channel: &str, text: &str) -> bool {
        let lines = split_on_char_boundary(text, MAX_TEXT_BYTES)
            .into_iter()
            .map(|chunk| message::action(channel, chunk))
            .collect();
        self.enqueue(lines)
    }
}
