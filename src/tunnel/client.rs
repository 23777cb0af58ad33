//! Client-side tunnel handler
//!
//! Every local connection gets its own TLS connection to the tunnel server.
//! No SOCKS5 parsing happens here; the server end speaks the protocol.

use super::relay::relay;
use crate::server::{Handler, StreamDyn};
use crate::transport::TlsDialer;
use anyhow::Result;
use bytes::Bytes;
use std::net::SocketAddr;
use tracing::debug;

/// [`Handler`] that pipes each local connection to the remote tunnel server
#[derive(Debug, Clone)]
pub struct ClientTunnelHandler {
    dialer: TlsDialer,
    remote_addr: String,
}

impl ClientTunnelHandler {
    /// Create a handler dialing `remote_addr` through `dialer`
    pub fn new(dialer: TlsDialer, remote_addr: impl Into<String>) -> Self {
        ClientTunnelHandler {
            dialer,
            remote_addr: remote_addr.into(),
        }
    }
}

#[async_trait::async_trait]
impl Handler for ClientTunnelHandler {
    fn name(&self) -> &str {
        "client-tunnel"
    }

    async fn handle(&self, stream: Box<dyn StreamDyn>, peer: SocketAddr) -> Result<()> {
        let remote = self.dialer.connect(&self.remote_addr).await?;
        debug!("Tunnel opened for {} via {}", peer, self.remote_addr);

        let stats = relay(stream, remote, Bytes::new()).await;
        debug!(
            "Tunnel closed for {} ({} bytes up, {} bytes down)",
            peer, stats.upstream, stats.downstream
        );

        Ok(())
    }
}
