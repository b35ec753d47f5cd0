#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tracing::{error, info};

mod bridge;
mod cli;
mod config;
mod db;
mod identity;
mod irc;
mod parsers;
mod shortener;
mod slack;
mod utils;
mod web;

use bridge::BridgeCore;
use cli::{Cli, Commands};
use config::Config;
use identity::IdentityCache;
use irc::IrcClient;
use shortener::LinkShortener;
use slack::{SignatureVerifier, SlackClient};
use utils::error::AppError;
use web::{WebServer, WebState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from_file(&cli.config).map_err(AppError::from)?;
    utils::logging::init_tracing(&config.logging);

    if cli.command == Some(Commands::ValidateConfig) {
        info!(
            "configuration is valid irc={} slack={}",
            config.bridge.irc_channel, config.bridge.slack_channel
        );
        return Ok(());
    }

    info!("irc-slack bridge starting up");
    if config.bridge.startup_delay_secs > 0 {
        info!("waiting {} seconds before connecting", config.bridge.startup_delay_secs);
        tokio::time::sleep(Duration::from_secs(config.bridge.startup_delay_secs)).await;
    }

    let binding = Arc::new(config.binding());
    let db_manager = db::DatabaseManager::new(config.avatar_store.as_ref())?;
    let identity = Arc::new(IdentityCache::new(db_manager.avatar_store()));
    let shortener = Arc::new(LinkShortener::new(&config.shortener)?);

    let slack_client = Arc::new(SlackClient::new(&config.slack)?);
    slack_client
        .start()
        .await
        .map_err(|err| AppError::Slack(format!("{err:#}")))?;

    let irc_client = Arc::new(IrcClient::new(&config.irc, &binding));

    let bridge = Arc::new(BridgeCore::new(
        binding.clone(),
        irc_client.clone(),
        slack_client.clone(),
        slack_client.clone(),
        shortener,
        identity,
        config.bridge.irc_message_format.clone(),
    ));

    let web_server = WebServer::new(
        &config.bridge,
        WebState {
            bridge: bridge.clone(),
            irc: irc_client.clone(),
            verifier: SignatureVerifier::new(SecretString::from(
                config.slack.signing_secret.clone(),
            )),
            started_at: Instant::now(),
        },
    );

    let (irc_events_tx, irc_events_rx) = mpsc::unbounded_channel();
    tokio::spawn(bridge.clone().run_irc_events(irc_events_rx));

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("{}", AppError::Web(format!("{e:#}")));
        }
    });

    let irc_handle = {
        let irc_client = irc_client.clone();
        tokio::spawn(async move { irc_client.run(irc_events_tx).await })
    };

    tokio::pin!(web_handle);
    tokio::pin!(irc_handle);

    let mut failure = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, beginning shutdown");
        },
        _ = &mut web_handle => {
            info!("web server task exited, beginning shutdown");
        },
        result = &mut irc_handle => {
            match result {
                Ok(Ok(())) => info!("irc task exited, beginning shutdown"),
                Ok(Err(e)) => failure = Some(AppError::Irc(format!("{e:#}"))),
                Err(e) => failure = Some(AppError::Irc(format!("irc task panicked: {e}"))),
            }
        },
    }

    irc_client.quit("bridge shutting down");
    tokio::time::sleep(Duration::from_millis(200)).await;
    web_handle.abort();
    irc_handle.abort();

    if let Some(err) = failure {
        error!("{}", err);
        return Err(err.into());
    }
    info!("irc-slack bridge shutting down");
    Ok(())
}
