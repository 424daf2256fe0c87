//! `livecall` command-line client.
//!
//! Each invocation connects to the market server, resumes the cached session
//! and runs one command.

mod capture;
mod commands;
mod events;
mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use livecall_core::config::MarketConfig;
use livecall_core::domain::account::{Gender, MediaKind};

use crate::state::ClientState;

#[derive(Debug, Parser)]
#[command(name = "livecall", about = "Paid video-call marketplace client")]
struct Cli {
    /// TOML config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "livecall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account. Women register as providers, men as payers.
    Register {
        handle: String,
        name: String,
        gender: Gender,
        #[arg(long)]
        secret: String,
    },
    Login {
        handle: String,
        #[arg(long)]
        secret: String,
    },
    Logout,
    Whoami,

    /// Online, approved providers.
    Discover {
        filter: Option<String>,
    },
    /// Approved providers regardless of presence.
    Showcase {
        filter: Option<String>,
    },

    // Admin
    Pending,
    Approved,
    Payers,
    Stats,
    Approve {
        provider: u64,
    },
    Reject {
        provider: u64,
    },

    // Provider
    Online,
    Offline,
    Rate {
        rate: u64,
    },
    #[command(subcommand)]
    Media(MediaCommand),
    /// Stay online and wait for callers until Ctrl-C.
    Standby,

    // Payer
    Balance,
    TopUp {
        amount: u64,
    },
    /// Buy and run a call with a provider.
    Call {
        provider: u64,
        minutes: u32,
        #[arg(long)]
        mute: bool,
        #[arg(long)]
        no_video: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum MediaCommand {
    Add { locator: String, kind: MediaKind },
    Remove { id: u64 },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = MarketConfig::load(&cli.config)?;
    let state = ClientState::connect(config).await?;
    commands::run(&state, cli.command).await
}
