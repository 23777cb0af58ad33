//! SOCKS5 message codec
//!
//! Buffer-in/buffer-out translation between wire bytes and the per-connection
//! request state. Every parse is single-shot against a slice that must already
//! hold the complete message; a short slice yields [`Socks5Error::Incomplete`]
//! and the caller decides whether to read more.
//!
//! ```text
//! handshake:  VER | NMETHODS | METHODS...
//! request:    VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT
//! reply:      VER | REP | RSV | ATYP=1 | 0.0.0.0 | 0
//! ```

use super::consts::*;
use super::types::{SocksCommand, TargetAddr};
use crate::error::{Socks5Error, Socks5ReplyCode};
use std::net::Ipv4Addr;

/// SOCKS5 state for one connection
///
/// `status` always reflects the outcome of the most recent parse and drives
/// both [`handshake_reply`](Self::handshake_reply) and [`reply`](Self::reply).
#[derive(Debug, Clone)]
pub struct Socks5Request {
    status: Socks5ReplyCode,
    command: Option<SocksCommand>,
    target: Option<TargetAddr>,
}

impl Default for Socks5Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Socks5Request {
    /// Fresh state with an undefined status
    pub fn new() -> Self {
        Socks5Request {
            status: Socks5ReplyCode::Undefined,
            command: None,
            target: None,
        }
    }

    /// Outcome of the most recent parse
    pub fn status(&self) -> Socks5ReplyCode {
        self.status
    }

    /// Parse the client's method-selection message.
    ///
    /// Returns the number of bytes consumed (`2 + NMETHODS`). The offered
    /// methods are not inspected: "no authentication" is always selected.
    pub fn parse_handshake(&mut self, buf: &[u8]) -> Result<usize, Socks5Error> {
        let result = decode_handshake(buf);
        self.status = match &result {
            Ok(_) => Socks5ReplyCode::Succeeded,
            Err(e) => e.reply_code(),
        };
        result
    }

    /// Server method-selection reply for the last handshake parse
    pub fn handshake_reply(&self) -> [u8; 2] {
        if self.status == Socks5ReplyCode::Succeeded {
            [SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE]
        } else {
            [SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE]
        }
    }

    /// Parse the client's request message.
    ///
    /// Accepts CONNECT and UDP ASSOCIATE with an IPv4 or domain destination.
    /// Returns the number of bytes consumed; anything after that belongs to
    /// the application stream.
    pub fn parse_request(&mut self, buf: &[u8]) -> Result<usize, Socks5Error> {
        match decode_request(buf) {
            Ok((command, target, consumed)) => {
                self.status = Socks5ReplyCode::Succeeded;
                self.command = Some(command);
                self.target = Some(target);
                Ok(consumed)
            }
            Err(e) => {
                self.status = e.reply_code();
                self.target = None;
                Err(e)
            }
        }
    }

    /// Reply carrying the current status
    pub fn reply(&self) -> [u8; SOCKS5_REPLY_LEN] {
        Self::reply_with(self.status)
    }

    /// Reply carrying an explicit status.
    ///
    /// The bound address and port are always zero-filled.
    pub fn reply_with(code: Socks5ReplyCode) -> [u8; SOCKS5_REPLY_LEN] {
        [
            SOCKS5_VERSION,
            code.into(),
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
            0,
            0,
            0,
            0,
            0,
            0,
        ]
    }

    /// Command of the last successfully parsed request
    pub fn command(&self) -> Option<SocksCommand> {
        self.command
    }

    /// Parsed destination, only while the status is `Succeeded`
    pub fn target(&self) -> Option<&TargetAddr> {
        match self.status {
            Socks5ReplyCode::Succeeded => self.target.as_ref(),
            _ => None,
        }
    }

    /// Dialable `host:port` string, empty unless the status is `Succeeded`
    pub fn address(&self) -> String {
        self.target().map(ToString::to_string).unwrap_or_default()
    }
}

fn incomplete(needed: usize, buf: &[u8]) -> Socks5Error {
    Socks5Error::Incomplete {
        needed,
        available: buf.len(),
    }
}

fn check_version(buf: &[u8]) -> Result<(), Socks5Error> {
    match buf.first() {
        Some(&version) if version != SOCKS5_VERSION => {
            Err(Socks5Error::UnsupportedVersion(version))
        }
        _ => Ok(()),
    }
}

fn decode_handshake(buf: &[u8]) -> Result<usize, Socks5Error> {
    check_version(buf)?;

    if buf.len() < SOCKS5_MIN_HANDSHAKE_LEN {
        return Err(incomplete(SOCKS5_MIN_HANDSHAKE_LEN, buf));
    }

    let consumed = 2 + buf[1] as usize;
    if buf.len() < consumed {
        return Err(incomplete(consumed, buf));
    }

    Ok(consumed)
}

fn decode_request(buf: &[u8]) -> Result<(SocksCommand, TargetAddr, usize), Socks5Error> {
    check_version(buf)?;

    if buf.len() < SOCKS5_REQUEST_HEADER_LEN {
        return Err(incomplete(SOCKS5_REQUEST_HEADER_LEN, buf));
    }

    let command = match SocksCommand::from_byte(buf[1]) {
        Some(cmd @ (SocksCommand::Connect | SocksCommand::UdpAssociate)) => cmd,
        _ => return Err(Socks5Error::CommandNotSupported(buf[1])),
    };

    if buf[2] != SOCKS5_RESERVED {
        return Err(Socks5Error::ReservedNotZero(buf[2]));
    }

    let addr_type = buf[3];
    let (offset, addr_len) = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => (SOCKS5_REQUEST_HEADER_LEN, SOCKS5_IPV4_LEN),
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = *buf
                .get(SOCKS5_REQUEST_HEADER_LEN)
                .ok_or_else(|| incomplete(SOCKS5_REQUEST_HEADER_LEN + 1, buf))?;
            (SOCKS5_REQUEST_HEADER_LEN + 1, len as usize)
        }
        other => return Err(Socks5Error::AddressTypeNotSupported(other)),
    };

    if addr_len == 0 {
        return Err(Socks5Error::EmptyAddress);
    }

    let port_offset = offset + addr_len;
    let consumed = port_offset + SOCKS5_PORT_LEN;
    if buf.len() < consumed {
        return Err(incomplete(consumed, buf));
    }

    let addr = &buf[offset..port_offset];
    let port = u16::from_be_bytes([buf[port_offset], buf[port_offset + 1]]);

    let target = if addr_type == SOCKS5_ADDR_TYPE_IPV4 {
        TargetAddr::ipv4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]), port)
    } else {
        let domain = std::str::from_utf8(addr)
            .map_err(|_| Socks5Error::InvalidDomain(String::from_utf8_lossy(addr).into_owned()))?;
        TargetAddr::domain(domain, port)
    };

    Ok((command, target, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut request = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        request.extend_from_slice(&ip);
        request.extend_from_slice(&port.to_be_bytes());
        request
    }

    fn connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut request = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        request.extend_from_slice(domain.as_bytes());
        request.extend_from_slice(&port.to_be_bytes());
        request
    }

    #[test]
    fn test_new_state_is_undefined() {
        let s5 = Socks5Request::new();
        assert_eq!(s5.status(), Socks5ReplyCode::Undefined);
        assert_eq!(s5.command(), None);
        assert_eq!(s5.address(), "");
        assert_eq!(s5.handshake_reply(), [0x05, 0xFF]);
    }

    #[test]
    fn test_parse_handshake_boundaries() {
        for len in 0..=8usize {
            for nmethods in 0..=6u8 {
                let mut buf = vec![0u8; len];
                if len > 0 {
                    buf[0] = SOCKS5_VERSION;
                }
                if len > 1 {
                    buf[1] = nmethods;
                }

                let mut s5 = Socks5Request::new();
                let result = s5.parse_handshake(&buf);
                let expect_ok = len >= 3 && len >= 2 + nmethods as usize;

                assert_eq!(result.is_ok(), expect_ok, "len={} nmethods={}", len, nmethods);
                if expect_ok {
                    assert_eq!(result.unwrap(), 2 + nmethods as usize);
                    assert_eq!(s5.status(), Socks5ReplyCode::Succeeded);
                } else {
                    assert_eq!(s5.status(), Socks5ReplyCode::GeneralFailure);
                }
            }
        }
    }

    #[test]
    fn test_parse_handshake_ignores_offered_methods() {
        let mut s5 = Socks5Request::new();
        let n = s5
            .parse_handshake(&[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_PASSWORD])
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(s5.handshake_reply(), [0x05, 0x00]);
    }

    #[test]
    fn test_parse_handshake_bad_version() {
        let mut s5 = Socks5Request::new();
        let err = s5.parse_handshake(&[0x04, 1, 0x00]).unwrap_err();
        assert_eq!(err, Socks5Error::UnsupportedVersion(4));
        assert_eq!(s5.status(), Socks5ReplyCode::GeneralFailure);
        assert_eq!(s5.handshake_reply(), [0x05, 0xFF]);

        // Even a truncated buffer is rejected on its version byte
        let err = s5.parse_handshake(&[0x04]).unwrap_err();
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_parse_handshake_incomplete() {
        let mut s5 = Socks5Request::new();
        let err = s5.parse_handshake(&[SOCKS5_VERSION, 3, 0x00]).unwrap_err();
        assert_eq!(
            err,
            Socks5Error::Incomplete {
                needed: 5,
                available: 3
            }
        );
    }

    #[test]
    fn test_parse_request_ipv4() {
        let mut s5 = Socks5Request::new();
        let request = connect_ipv4([10, 1, 2, 3], 0x1F90);

        let n = s5.parse_request(&request).unwrap();

        assert_eq!(n, 10);
        assert_eq!(s5.status(), Socks5ReplyCode::Succeeded);
        assert_eq!(s5.command(), Some(SocksCommand::Connect));
        assert_eq!(s5.address(), "10.1.2.3:8080");
        assert_eq!(
            s5.target(),
            Some(&TargetAddr::ipv4(Ipv4Addr::new(10, 1, 2, 3), 8080))
        );
    }

    #[test]
    fn test_parse_request_domain() {
        let mut s5 = Socks5Request::new();
        let request = connect_domain("example.com", 443);

        let n = s5.parse_request(&request).unwrap();

        assert_eq!(n, 4 + 1 + 11 + 2);
        assert_eq!(s5.address(), "example.com:443");
    }

    #[test]
    fn test_parse_request_reports_consumed_with_trailing_data() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([127, 0, 0, 1], 80);
        request.extend_from_slice(b"GET / HTTP/1.1\r\n");

        assert_eq!(s5.parse_request(&request).unwrap(), 10);
    }

    #[test]
    fn test_parse_request_udp_associate_is_accepted() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([0, 0, 0, 0], 0);
        request[1] = SOCKS5_CMD_UDP_ASSOCIATE;

        s5.parse_request(&request).unwrap();
        assert_eq!(s5.command(), Some(SocksCommand::UdpAssociate));
    }

    #[test]
    fn test_parse_request_bind_rejected() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([127, 0, 0, 1], 80);
        request[1] = SOCKS5_CMD_TCP_BIND;

        let err = s5.parse_request(&request).unwrap_err();
        assert_eq!(err, Socks5Error::CommandNotSupported(SOCKS5_CMD_TCP_BIND));
        assert_eq!(s5.status(), Socks5ReplyCode::CommandNotSupported);
    }

    #[test]
    fn test_parse_request_reserved_must_be_zero() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([127, 0, 0, 1], 80);
        request[2] = 0x01;

        s5.parse_request(&request).unwrap_err();
        assert_eq!(s5.status(), Socks5ReplyCode::CommandNotSupported);
    }

    #[test]
    fn test_parse_request_ipv6_rejected_regardless_of_length() {
        for total in [4usize, 6, 8, 22, 64] {
            let mut request = vec![0u8; total];
            request[..4].copy_from_slice(&[
                SOCKS5_VERSION,
                SOCKS5_CMD_TCP_CONNECT,
                SOCKS5_RESERVED,
                SOCKS5_ADDR_TYPE_IPV6,
            ]);

            let mut s5 = Socks5Request::new();
            let err = s5.parse_request(&request).unwrap_err();

            assert_eq!(err, Socks5Error::AddressTypeNotSupported(SOCKS5_ADDR_TYPE_IPV6));
            assert_eq!(s5.status(), Socks5ReplyCode::AddressTypeNotSupported);
            assert_eq!(s5.address(), "");
        }
    }

    #[test]
    fn test_parse_request_unknown_address_type() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([127, 0, 0, 1], 80);
        request[3] = 0x09;

        s5.parse_request(&request).unwrap_err();
        assert_eq!(s5.status(), Socks5ReplyCode::AddressTypeNotSupported);
    }

    #[test]
    fn test_parse_request_empty_domain() {
        let mut s5 = Socks5Request::new();
        let request = [
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            0,
            0,
            80,
            0,
        ];

        assert_eq!(
            s5.parse_request(&request).unwrap_err(),
            Socks5Error::EmptyAddress
        );
        assert_eq!(s5.status(), Socks5ReplyCode::AddressTypeNotSupported);
    }

    #[test]
    fn test_parse_request_bad_version() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([127, 0, 0, 1], 80);
        request[0] = 0x04;

        assert_eq!(
            s5.parse_request(&request).unwrap_err(),
            Socks5Error::UnsupportedVersion(4)
        );
        assert_eq!(s5.status(), Socks5ReplyCode::GeneralFailure);
    }

    #[test]
    fn test_parse_request_short_buffers_fail() {
        let full = connect_domain("example.com", 443);
        for len in 0..full.len() {
            let mut s5 = Socks5Request::new();
            let err = s5.parse_request(&full[..len]).unwrap_err();
            assert!(err.is_incomplete(), "len={} err={}", len, err);
            assert_eq!(s5.status(), Socks5ReplyCode::GeneralFailure);
        }

        // Seven bytes can never hold a complete request
        let mut s5 = Socks5Request::new();
        assert!(s5.parse_request(&connect_ipv4([1, 2, 3, 4], 5)[..7]).is_err());
    }

    #[test]
    fn test_address_cleared_after_failed_parse() {
        let mut s5 = Socks5Request::new();
        s5.parse_request(&connect_ipv4([127, 0, 0, 1], 80)).unwrap();
        assert_eq!(s5.address(), "127.0.0.1:80");

        let mut bad = connect_ipv4([127, 0, 0, 1], 80);
        bad[3] = SOCKS5_ADDR_TYPE_IPV6;
        s5.parse_request(&bad).unwrap_err();
        assert_eq!(s5.address(), "");
        assert!(s5.target().is_none());
    }

    #[test]
    fn test_reply_after_success() {
        let mut s5 = Socks5Request::new();
        s5.parse_request(&connect_ipv4([8, 8, 8, 8], 53)).unwrap();
        assert_eq!(s5.reply(), [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reply_after_failure_only_changes_status_byte() {
        let mut s5 = Socks5Request::new();
        let mut request = connect_ipv4([8, 8, 8, 8], 53);
        request[3] = SOCKS5_ADDR_TYPE_IPV6;
        s5.parse_request(&request).unwrap_err();

        let reply = s5.reply();
        let success = Socks5Request::reply_with(Socks5ReplyCode::Succeeded);
        assert_eq!(reply[1], 0x08);
        assert_eq!(reply[0], success[0]);
        assert_eq!(&reply[2..], &success[2..]);
    }

    #[test]
    fn test_reply_with_explicit_code() {
        let reply = Socks5Request::reply_with(Socks5ReplyCode::ConnectionRefused);
        assert_eq!(reply, [0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }
}
