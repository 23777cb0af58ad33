//! Transport configuration types
//!
//! TCP socket tuning and the PEM files backing the mutual TLS layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_nodelay() -> bool {
    true
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

/// TCP socket configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

/// PEM files for mutual TLS
///
/// Both roles use the same layout: the shared trust root plus the
/// process's own certificate chain and private key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Trust root (CA certificate) used to verify the peer
    pub ca_cert: PathBuf,

    /// Own certificate chain
    pub cert: PathBuf,

    /// Own private key (PKCS#8, PKCS#1 or SEC1)
    pub key: PathBuf,
}

impl TlsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in [("ca_cert", &self.ca_cert), ("cert", &self.cert), ("key", &self.key)] {
            if path.as_os_str().is_empty() {
                return Err(format!("tls.{} must not be empty", name));
            }
        }
        Ok(())
    }
}
