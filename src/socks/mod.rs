//! SOCKS5 module for Tlsocks
//!
//! Pure, connection-agnostic parsing and encoding of the SOCKS5 handshake,
//! request and reply messages. Nothing here touches a socket; the tunnel
//! session feeds buffered bytes in and writes the encoded replies out.

mod codec;
mod consts;
mod types;

pub use codec::Socks5Request;
pub use consts::*;
pub use types::{SocksCommand, TargetAddr};
