//! Gateway entrypoint

use anyhow::Result;
use arcveil_core::MemoryArchiveStore;
use arcveil_gateway::{GatewayApi, GatewayConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "av-gateway", about = "Arcveil privacy gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Path to a TOML or JSON config file
        #[arg(long, default_value = "arcveil.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => {
            let config = if config.exists() {
                GatewayConfig::from_file(&config)?
            } else {
                tracing::warn!(
                    "Config file not found, using defaults: {}",
                    config.display()
                );
                GatewayConfig::default()
            };
            if config.users.is_empty() {
                tracing::warn!("no users configured, every login will be rejected");
            }

            let store = Arc::new(MemoryArchiveStore::new());
            let api = GatewayApi::new(Arc::new(config), store);
            api.serve().await
        }
    }
}
