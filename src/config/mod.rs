//! Configuration module for Tlsocks
//!
//! This module provides configuration types and parsing for both tunnel roles.

mod transport;
mod tunnel;

pub use transport::{TcpConfig, TlsConfig};
pub use tunnel::{ClientConfig, Config, ServerConfig};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}
