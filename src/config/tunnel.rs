//! Tunnel configuration types
//!
//! One table per role. A single file may carry both, each binary reads the
//! table for the role it runs.

use super::{TcpConfig, TlsConfig};
use serde::{Deserialize, Serialize};

fn default_server_listen_addr() -> String {
    "0.0.0.0:9443".to_string()
}

fn default_client_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

fn default_remote_addr() -> String {
    "127.0.0.1:9443".to_string()
}

fn default_server_name() -> String {
    "localhost".to_string()
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server role (mutual TLS listener, SOCKS5 sessions)
    #[serde(default)]
    pub server: Option<ServerConfig>,

    /// Client role (local plain listener, TLS dialer)
    #[serde(default)]
    pub client: Option<ClientConfig>,
}

impl Config {
    /// The `[server]` table, validated
    pub fn server(&self) -> Result<&ServerConfig, String> {
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| "Missing [server] section".to_string())?;
        server.validate()?;
        Ok(server)
    }

    /// The `[client]` table, validated
    pub fn client(&self) -> Result<&ClientConfig, String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| "Missing [client] section".to_string())?;
        client.validate()?;
        Ok(client)
    }

    /// Validate every table that is present
    pub fn validate(&self) -> Result<(), String> {
        if self.server.is_none() && self.client.is_none() {
            return Err("Configuration has neither [server] nor [client] section".to_string());
        }
        if let Some(server) = &self.server {
            server.validate()?;
        }
        if let Some(client) = &self.client {
            client.validate()?;
        }
        Ok(())
    }
}

/// Server role configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Public mutual TLS address (e.g., "0.0.0.0:9443")
    #[serde(default = "default_server_listen_addr")]
    pub listen_addr: String,

    /// Maximum simultaneously handled connections, unbounded when unset
    #[serde(default)]
    pub max_connections: Option<usize>,

    /// TLS material
    pub tls: TlsConfig,

    /// TCP options for accepted and dialed sockets
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("server.listen_addr must not be empty".to_string());
        }
        if self.max_connections == Some(0) {
            return Err("server.max_connections must be greater than 0".to_string());
        }
        self.tls.validate()
    }
}

/// Client role configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Local SOCKS5 address (e.g., "127.0.0.1:1080")
    #[serde(default = "default_client_listen_addr")]
    pub listen_addr: String,

    /// Tunnel server address
    #[serde(default = "default_remote_addr")]
    pub remote_addr: String,

    /// Name the server certificate must carry
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Maximum simultaneously handled connections, unbounded when unset
    #[serde(default)]
    pub max_connections: Option<usize>,

    /// TLS material
    pub tls: TlsConfig,

    /// TCP options for accepted and dialed sockets
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("client.listen_addr must not be empty".to_string());
        }
        if self.remote_addr.is_empty() {
            return Err("client.remote_addr must not be empty".to_string());
        }
        if self.server_name.is_empty() {
            return Err("client.server_name must not be empty".to_string());
        }
        if self.max_connections == Some(0) {
            return Err("client.max_connections must be greater than 0".to_string());
        }
        self.tls.validate()
    }
}
