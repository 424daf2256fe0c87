//! Shared store server binary: accounts, approvals and the ledger for every
//! client process.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use livecall_core::adapters::account_store::InMemoryAccountStore;
use livecall_core::adapters::crypto::secret::hasher_for;
use livecall_core::adapters::events::TracingAppEvents;
use livecall_core::adapters::ledger::InMemoryLedger;
use livecall_core::adapters::quic::server::MarketServer;
use livecall_core::adapters::snapshot::{SnapshotFile, StatePersister};
use livecall_core::application::market::MarketService;
use livecall_core::config::MarketConfig;

#[derive(Debug, Parser)]
#[command(name = "livecall-server", about = "Paid video-call marketplace store")]
struct Args {
    /// TOML config file; defaults apply when it does not exist.
    #[arg(long, default_value = "livecall.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = MarketConfig::load(&args.config)?;
    let opening = config.billing.opening_balance;

    let snapshot_file = config.server.state_file.as_ref().map(SnapshotFile::new);
    let (store, ledger) = match snapshot_file.as_ref().map(|f| f.load()).transpose()?.flatten() {
        Some(snapshot) => {
            info!(accounts = snapshot.accounts.len(), "Restoring market state");
            snapshot.into_adapters(opening)?
        }
        None => (InMemoryAccountStore::new(), InMemoryLedger::new(opening)),
    };

    let service = Arc::new(MarketService::new(
        &config,
        Arc::new(store),
        Arc::new(ledger),
        Arc::from(hasher_for(config.security.hasher)),
        Arc::new(TracingAppEvents),
    ));
    service.accounts().bootstrap_admin(&config.admin)?;

    let persister = snapshot_file.map(|file| StatePersister::new(file, Arc::clone(&service)));
    if let Some(persister) = &persister {
        persister.save()?;
    }

    info!(addr = %config.server.bind, "Market server starting");
    let server = Arc::new(MarketServer::new(config.server.bind, service, persister)?);
    server.run().await
}
