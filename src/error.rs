//! Error types for Tlsocks
//!
//! This module defines all custom error types used throughout the application.

use std::io;
use thiserror::Error;

/// Main error type for Tlsocks operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS material or handshake error
    #[error("TLS error: {0}")]
    Tls(String),

    /// The listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind
        addr: String,
        /// Underlying socket error
        source: io::Error,
    },

    /// Non-transient accept error
    #[error("Accept error: {0}")]
    Accept(io::Error),

    /// The listener was closed by its owner
    #[error("Listener closed")]
    ListenerClosed,

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),
}

/// SOCKS5 specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// The buffer does not yet hold a complete message
    #[error("Incomplete message: need {needed} bytes, have {available}")]
    Incomplete {
        /// Bytes required to make progress
        needed: usize,
        /// Bytes currently buffered
        available: usize,
    },

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Reserved byte was not zero
    #[error("Reserved byte must be zero, got: {0}")]
    ReservedNotZero(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Zero-length destination address
    #[error("Empty destination address")]
    EmptyAddress,

    /// Invalid domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Message did not fit into the protocol buffer
    #[error("Message exceeds {0} bytes")]
    MessageTooLarge(usize),
}

impl Socks5Error {
    /// Reply code reported to the client for this error
    pub fn reply_code(&self) -> Socks5ReplyCode {
        match self {
            Socks5Error::UnsupportedVersion(_)
            | Socks5Error::Incomplete { .. }
            | Socks5Error::InvalidDomain(_)
            | Socks5Error::MessageTooLarge(_) => Socks5ReplyCode::GeneralFailure,
            Socks5Error::CommandNotSupported(_) | Socks5Error::ReservedNotZero(_) => {
                Socks5ReplyCode::CommandNotSupported
            }
            Socks5Error::AddressTypeNotSupported(_) | Socks5Error::EmptyAddress => {
                Socks5ReplyCode::AddressTypeNotSupported
            }
        }
    }

    /// Whether more input could turn this error into a successful parse
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Socks5Error::Incomplete { .. })
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
    /// Nothing has been parsed yet
    Undefined = 0xFF,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}
