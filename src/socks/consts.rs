//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication (never selected)
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (never accepted)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (parsed, never dispatched)
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address (rejected)
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Message layout
/// VER + NMETHODS + at least one METHOD
pub const SOCKS5_MIN_HANDSHAKE_LEN: usize = 3;
/// VER + CMD + RSV + ATYP
pub const SOCKS5_REQUEST_HEADER_LEN: usize = 4;
/// Length of an IPv4 address
pub const SOCKS5_IPV4_LEN: usize = 4;
/// Length of the big-endian port field
pub const SOCKS5_PORT_LEN: usize = 2;
/// Length of the fixed reply sent for every request
pub const SOCKS5_REPLY_LEN: usize = 10;

// Buffer sizes
/// Largest handshake or request the session will buffer
pub const MAX_SOCKS5_BUF_LEN: usize = 2048;
