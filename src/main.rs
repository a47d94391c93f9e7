//! PolyVault Server Binary
//!
//! Main entry point for the PolyVault TCP server

use clap::Parser;
use polyvault::{PolyVaultServer, Result, ServerConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "polyvault-server", about = "In-memory multi-type key-value server", version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:6369")]
    bind: String,

    /// Maximum number of concurrently served connections
    #[arg(long, default_value_t = 1000)]
    max_connections: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: args.bind,
        max_connections: args.max_connections,
    };

    let server = Arc::new(PolyVaultServer::new(config));

    // Setup graceful shutdown on SIGINT (Ctrl+C)
    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }

        info!("received Ctrl+C, initiating graceful shutdown");
        if let Err(e) = server_clone.shutdown() {
            error!(error = %e, "failed to initiate shutdown");
        }
    });

    server.run().await?;

    Ok(())
}
