//! # Tlsocks - SOCKS5 over mutual TLS
//!
//! Tlsocks carries SOCKS5 traffic across an untrusted network inside a
//! mutually authenticated TLS connection. A local application speaks plain
//! SOCKS5 to the client process; the client forwards each connection over
//! TLS to the server, which terminates TLS, runs the SOCKS5 exchange, dials
//! the destination and relays bytes in both directions.
//!
//! ## Features
//!
//! - **Mutual TLS**: both ends present certificates issued by one trust root
//! - **Resilient Accept Loop**: transient accept errors back off from 5ms to 1s
//! - **Message Accumulation**: SOCKS5 messages split across reads are reassembled
//! - **Honest Replies**: the SOCKS5 reply reflects the actual dial outcome
//! - **Admission Gate**: optional cap on concurrently handled connections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tlsocks::config::load_config;
//! use tlsocks::tunnel::ServerTunnel;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("tlsocks.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     let server = config.server().map_err(anyhow::Error::msg)?;
//!     ServerTunnel::new(server)?.serve(shutdown_rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! App -> ClientTunnel (tcp) -> mTLS -> ServerTunnel (socks5) -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;
pub mod transport;
pub mod tunnel;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{Socks5Error, Socks5ReplyCode, TunnelError};
pub use tunnel::{ClientTunnel, ServerTunnel};

/// Version of the Tlsocks library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
