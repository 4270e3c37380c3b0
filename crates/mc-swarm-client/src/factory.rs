//! Builds per-bot connection settings from the swarm config.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::net::lookup_host;
use tracing::{debug, info};

use mc_swarm_world::BlockShapeTable;

use crate::account::Account;
use crate::config::SwarmConfig;
use crate::connection::{self, BotHandle, BotSettings};
use crate::error::BotError;
use crate::identity::IdentityProvider;

pub struct BotConnectionFactory {
    template: BotSettings,
    accounts: Vec<Account>,
    identity: Arc<dyn IdentityProvider>,
}

impl BotConnectionFactory {
    /// Resolve the target once; every bot connects to the same address.
    pub async fn from_config(
        config: &SwarmConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, BotError> {
        let address = resolve(&config.server.host, config.server.port).await?;
        debug!("Resolved {}:{} to {address}", config.server.host, config.server.port);
        Self::with_address(config, address, identity)
    }

    pub fn with_address(
        config: &SwarmConfig,
        address: SocketAddr,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, BotError> {
        let template = BotSettings {
            account: Account::offline(config.bots.bot_name(1)),
            protocol_version: config.server.protocol_version,
            host: config.server.host.clone(),
            port: config.server.port,
            address,
            intent: config.server.intent,
            proxy: config.proxy.clone(),
            timeouts: config.timeouts.clone(),
            client: config.client.clone(),
            auto_respawn: config.bots.auto_respawn,
            shapes: block_shapes(config.client.block_shapes.as_deref())?,
        };
        Ok(Self {
            template,
            accounts: accounts(config),
            identity,
        })
    }

    pub fn bot_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Settings for the bot at `index`, counting from zero.
    pub fn settings_for(&self, index: usize) -> Option<BotSettings> {
        let account = self.accounts.get(index)?.clone();
        Some(BotSettings {
            account,
            ..self.template.clone()
        })
    }

    pub async fn connect(&self, index: usize) -> Result<BotHandle, BotError> {
        let settings = self.settings_for(index).ok_or_else(|| {
            BotError::Task(format!("no account for bot {index}"))
        })?;
        connection::connect(Arc::new(settings), Arc::clone(&self.identity)).await
    }
}

/// Configured accounts first, then generated offline names for the rest.
pub fn accounts(config: &SwarmConfig) -> Vec<Account> {
    (0..config.bots.amount)
        .map(|i| match config.accounts.get(i) {
            Some(section) => Account::from_config(section),
            None => Account::offline(config.bots.bot_name(i + 1)),
        })
        .collect()
}

/// One table shared by every bot: the configured file, or the bundled one.
pub fn block_shapes(path: Option<&Path>) -> Result<Arc<BlockShapeTable>, BotError> {
    match path {
        Some(path) => {
            let table = BlockShapeTable::load(path)?;
            info!("Loaded block shapes from {}", path.display());
            Ok(Arc::new(table))
        }
        None => Ok(BlockShapeTable::bundled()),
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, BotError> {
    lookup_host((host, port)).await?.next().ok_or_else(|| {
        BotError::Transport(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {host}"),
        ))
    })
}
