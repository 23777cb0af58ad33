//! Tlsocks server - mutual TLS endpoint running SOCKS5 sessions

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tlsocks::config::load_config;
use tlsocks::helper::{setup_logging, spawn_shutdown_signal};
use tlsocks::tunnel::ServerTunnel;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Tlsocks server - terminates mutual TLS and proxies SOCKS5 requests
#[derive(Parser, Debug)]
#[command(name = "tlsocks-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_log)?;

    let config = load_config(&args.config)?;
    let server = config.server().map_err(anyhow::Error::msg)?;

    info!("Tlsocks server v{}", tlsocks::VERSION);
    info!("Configuration loaded from: {:?}", args.config);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    spawn_shutdown_signal(shutdown_tx)?;

    if let Err(e) = ServerTunnel::new(server)?.serve(shutdown_rx).await {
        error!("Server stopped: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}
