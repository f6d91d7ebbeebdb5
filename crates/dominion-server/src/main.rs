//! Dominion governance server.
//!
//! Loads (or writes) the options file, restores the last snapshot, then
//! runs the engine loop until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dominion_core::EngineOptions;
use dominion_server::{Command, Host};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "dominion-server", about = "Territorial governance engine host")]
struct Args {
    /// Options file; written with defaults when missing.
    #[arg(long, default_value = "dominion.options.json")]
    config: PathBuf,

    /// Snapshot file for persisted state.
    #[arg(long, default_value = "dominion.snapshot.json")]
    snapshot: PathBuf,

    /// Seconds between automatic snapshot saves.
    #[arg(long, default_value_t = 300)]
    autosave_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dominion_server=info,dominion_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let options = EngineOptions::load_or_write_default(&args.config)?;

    let mut host = Host::new(
        options,
        args.snapshot,
        Duration::from_secs(args.autosave_secs),
    );
    host.restore()?;

    info!("dominion-server v{}", env!("CARGO_PKG_VERSION"));

    // The command front-end (chat/RCON bridge) hands its sender to
    // whatever transport embeds this process.
    let (_command_tx, command_rx) = mpsc::channel::<Command>(256);

    host.run(command_rx).await
}
