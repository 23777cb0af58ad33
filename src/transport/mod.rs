//! Transport module for Tlsocks
//!
//! Socket tuning and outbound dialing shared by both tunnel roles, plus the
//! TLS material and rustls configuration assembly in [`tls`].

pub mod tls;

pub use tls::{client_config, server_config, TlsDialer, TlsMaterial};

use crate::config::TcpConfig;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Socket options for configuring connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Open a TCP connection to `addr` (`host:port`, resolved if needed).
///
/// No timeout is applied; a stalled destination holds the caller.
pub async fn connect_tcp(addr: &str, opts: &SocketOpts) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    if let Err(e) = opts.apply(&stream) {
        tracing::warn!("Failed to apply socket options to {}: {}", addr, e);
    }
    debug!("TCP connection established to {}", addr);
    Ok(stream)
}
