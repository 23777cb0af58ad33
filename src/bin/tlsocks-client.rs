//! Tlsocks client - local SOCKS5 endpoint tunnelled over mutual TLS

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tlsocks::config::load_config;
use tlsocks::helper::{setup_logging, spawn_shutdown_signal};
use tlsocks::tunnel::ClientTunnel;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Tlsocks client - forwards local SOCKS5 connections to a tlsocks server
#[derive(Parser, Debug)]
#[command(name = "tlsocks-client")]
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
    let client = config.client().map_err(anyhow::Error::msg)?;

    info!("Tlsocks client v{}", tlsocks::VERSION);
    info!("Configuration loaded from: {:?}", args.config);
    info!("Tunnel server: {} ({})", client.remote_addr, client.server_name);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    spawn_shutdown_signal(shutdown_tx)?;

    if let Err(e) = ClientTunnel::new(client)?.serve(shutdown_rx).await {
        error!("Client stopped: {}", e);
        return Err(e.into());
    }

    info!("Client stopped");
    Ok(())
}
