//! Tunnel services
//!
//! Each service composes TLS material, a [`ConnectionServer`] and a
//! [`Handler`](crate::server::Handler):
//!
//! ```text
//! app --SOCKS5--> ClientTunnel --mTLS--> ServerTunnel --TCP--> destination
//! ```
//!
//! The server terminates mutual TLS and runs a SOCKS5 [`Session`] per
//! connection. The client listens in plain TCP and pipes every local
//! connection to the server over its own TLS connection.

mod client;
mod relay;
mod session;

pub use client::ClientTunnelHandler;
pub use relay::{relay, RelayStats};
pub use session::{Session, Socks5Handler};

use crate::config::{ClientConfig, ServerConfig};
use crate::error::TunnelError;
use crate::server::{ConnectionServer, Handler, ListenerHandle};
use crate::transport::{client_config, server_config, SocketOpts, TlsDialer, TlsMaterial};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

/// Server role: mutual TLS listener running SOCKS5 sessions
#[derive(Debug)]
pub struct ServerTunnel {
    server: ConnectionServer,
    handler: Arc<dyn Handler>,
}

impl ServerTunnel {
    /// Build from configuration, reading the TLS files it names
    pub fn new(config: &ServerConfig) -> Result<Self, TunnelError> {
        config.validate().map_err(TunnelError::Config)?;
        let material =
            TlsMaterial::load(&config.tls).map_err(|e| TunnelError::Tls(format!("{:#}", e)))?;
        Self::with_material(config, &material)
    }

    /// Build from configuration with TLS material supplied by the caller
    pub fn with_material(config: &ServerConfig, material: &TlsMaterial) -> Result<Self, TunnelError> {
        config.validate().map_err(TunnelError::Config)?;
        let tls = server_config(material).map_err(|e| TunnelError::Tls(format!("{:#}", e)))?;
        let socket_opts = SocketOpts::from_tcp_config(&config.tcp);

        let server = ConnectionServer::tls(config.listen_addr.clone(), tls)
            .with_socket_opts(socket_opts.clone())
            .with_max_connections(config.max_connections);

        Ok(ServerTunnel {
            server,
            handler: Arc::new(Socks5Handler::new(socket_opts)),
        })
    }

    /// Bind the listener and start accepting
    pub async fn bind(self) -> Result<RunningTunnel, TunnelError> {
        RunningTunnel::start(self.server, self.handler).await
    }

    /// Run until a fatal listener error or a shutdown signal
    pub async fn serve(self, shutdown_rx: broadcast::Receiver<bool>) -> Result<(), TunnelError> {
        self.bind().await?.serve(shutdown_rx).await
    }
}

/// Client role: local plain listener piping into the tunnel server
#[derive(Debug)]
pub struct ClientTunnel {
    server: ConnectionServer,
    handler: Arc<dyn Handler>,
}

impl ClientTunnel {
    /// Build from configuration, reading the TLS files it names
    pub fn new(config: &ClientConfig) -> Result<Self, TunnelError> {
        config.validate().map_err(TunnelError::Config)?;
        let material =
            TlsMaterial::load(&config.tls).map_err(|e| TunnelError::Tls(format!("{:#}", e)))?;
        Self::with_material(config, &material)
    }

    /// Build from configuration with TLS material supplied by the caller
    pub fn with_material(config: &ClientConfig, material: &TlsMaterial) -> Result<Self, TunnelError> {
        config.validate().map_err(TunnelError::Config)?;
        let tls = client_config(material).map_err(|e| TunnelError::Tls(format!("{:#}", e)))?;
        let socket_opts = SocketOpts::from_tcp_config(&config.tcp);
        let dialer = TlsDialer::new(tls, &config.server_name, socket_opts.clone())
            .map_err(|e| TunnelError::Config(format!("{:#}", e)))?;

        let server = ConnectionServer::tcp(config.listen_addr.clone())
            .with_socket_opts(socket_opts)
            .with_max_connections(config.max_connections);

        Ok(ClientTunnel {
            server,
            handler: Arc::new(ClientTunnelHandler::new(dialer, config.remote_addr.clone())),
        })
    }

    /// Bind the listener and start accepting
    pub async fn bind(self) -> Result<RunningTunnel, TunnelError> {
        RunningTunnel::start(self.server, self.handler).await
    }

    /// Run until a fatal listener error or a shutdown signal
    pub async fn serve(self, shutdown_rx: broadcast::Receiver<bool>) -> Result<(), TunnelError> {
        self.bind().await?.serve(shutdown_rx).await
    }
}

/// A tunnel service whose listener is bound and accepting
#[derive(Debug)]
pub struct RunningTunnel {
    server: ConnectionServer,
    listener: ListenerHandle,
    name: String,
}

impl RunningTunnel {
    async fn start(server: ConnectionServer, handler: Arc<dyn Handler>) -> Result<Self, TunnelError> {
        let name = handler.name().to_string();
        let listener = server.serve(handler).await?;

        Ok(RunningTunnel {
            server,
            listener,
            name,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Block until the listener fails or `shutdown_rx` fires.
    ///
    /// A fatal listener error is returned as is. A shutdown signal closes
    /// the listener and returns `Ok(())`; connections already dispatched
    /// keep running to their own completion.
    pub async fn serve(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<(), TunnelError> {
        let RunningTunnel {
            mut server,
            listener,
            name,
        } = self;

        tokio::select! {
            err = server.wait() => Err(err),
            _ = shutdown_signal(&mut shutdown_rx) => {
                info!("Shutdown signal received, stopping {}", name);
                listener.close();
                listener.stopped().await;
                Ok(())
            }
        }
    }
}

/// Resolve on a shutdown message. A closed channel carries no signal and
/// never resolves; a lagged receiver still missed a shutdown.
async fn shutdown_signal(shutdown_rx: &mut broadcast::Receiver<bool>) {
    match shutdown_rx.recv().await {
        Ok(_) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}
