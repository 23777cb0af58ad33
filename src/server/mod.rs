//! Connection server for Tlsocks
//!
//! Turns a plain TCP or TLS listener into a supervised stream of dispatched
//! connections. Every accepted connection is handed to a [`Handler`] on its
//! own task; the server never waits for a handler to finish.
//!
//! # Example
//!
//! ```rust,ignore
//! use tlsocks::server::{ConnectionServer, Handler};
//!
//! let mut server = ConnectionServer::tcp("127.0.0.1:1080");
//! let listener = server.serve(handler).await?;
//! info!("listening on {}", listener.local_addr());
//!
//! // Blocks until the accept loop hits a fatal error
//! let err = server.wait().await;
//! ```

mod backoff;
mod listener;

pub use backoff::AcceptBackoff;
pub use listener::{is_transient, ConnectionServer, ListenerHandle};

use anyhow::Result;
use std::fmt::Debug;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

/// Trait that all connection handlers must implement.
///
/// The handler owns the connection from dispatch onward and is solely
/// responsible for closing it, which happens when the boxed stream is
/// dropped. Errors returned here are logged by the server and never reach
/// the accept loop.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + Debug {
    /// Human-readable name used in log lines (e.g., "socks5", "client-tunnel").
    fn name(&self) -> &str;

    /// Handle one accepted connection until it is finished.
    async fn handle(&self, stream: Box<dyn StreamDyn>, peer: SocketAddr) -> Result<()>;
}

/// A dynamic stream trait for connection handlers.
///
/// Lets a handler accept plain TCP and TLS-terminated streams alike.
pub trait StreamDyn: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

/// Blanket implementation: any type implementing the required traits is a StreamDyn.
impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> StreamDyn for T {}
