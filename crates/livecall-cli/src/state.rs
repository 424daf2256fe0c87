//! Client state: the market connection and the session manager built on it.

use std::sync::Arc;

use tracing::info;

use livecall_core::adapters::quic::client::QuicMarketClient;
use livecall_core::adapters::snapshot::FileSessionCache;
use livecall_core::application::ports::{AppEvents, MarketApi};
use livecall_core::application::session::SessionManager;
use livecall_core::config::MarketConfig;
use livecall_core::domain::error::MarketError;
use livecall_core::domain::session::{Capability, Session};

use crate::events::ConsoleAppEvents;

pub struct ClientState {
    pub config: MarketConfig,
    pub api: Arc<dyn MarketApi>,
    pub sessions: SessionManager,
    pub app_events: Arc<dyn AppEvents>,
}

impl ClientState {
    /// Connect to the market and pick up the cached session, if it is
    /// still accepted.
    pub async fn connect(config: MarketConfig) -> anyhow::Result<Self> {
        let client = &config.client;
        let api: Arc<dyn MarketApi> =
            Arc::new(QuicMarketClient::connect(client.server_addr, &client.server_name).await?);
        let cache = Arc::new(FileSessionCache::new(client.session_file.clone()));
        let sessions = SessionManager::new(Arc::clone(&api), cache);

        if let Some(session) = sessions.restore().await? {
            info!(id = %session.account_id(), "Resumed cached session");
        }

        Ok(Self {
            config,
            api,
            sessions,
            app_events: Arc::new(ConsoleAppEvents),
        })
    }

    pub fn require(&self, capability: Capability) -> Result<Session, MarketError> {
        self.sessions.require(capability)
    }
}
