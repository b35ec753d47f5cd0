use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use salvo::affix_state;
use salvo::prelude::*;
use tracing::info;

use crate::bridge::BridgeCore;
use crate::config::BridgeConfig;
use crate::irc::IrcClient;
use crate::slack::SignatureVerifier;

mod events;
mod health;

use events::slack_events;
use health::{get_status, health_check};

pub struct WebState {
    pub bridge: Arc<BridgeCore>,
    pub irc: Arc<IrcClient>,
    pub verifier: SignatureVerifier,
    pub started_at: Instant,
}

pub fn web_state(depot: &Depot) -> Option<&Arc<WebState>> {
    depot.obtain::<Arc<WebState>>().ok()
}

pub struct WebServer {
    bind_address: String,
    port: u16,
    state: Arc<WebState>,
}

impl WebServer {
    pub fn new(config: &BridgeConfig, state: WebState) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            state: Arc::new(state),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.bind_address, self.port);
        info!("starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor)
            .serve(root_router(self.state.clone()))
            .await;

        Ok(())
    }
}

pub fn root_router(state: Arc<WebState>) -> Router {
    Router::new()
        .hoop(affix_state::inject(state))
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("slack/events").post(slack_events))
}
