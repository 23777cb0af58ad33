//! Test utilities and mocks for Tlsocks
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use tlsocks::config::{ClientConfig, ServerConfig, TcpConfig, TlsConfig};
use tlsocks::transport::TlsMaterial;
use tokio::net::TcpListener;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a TCP echo destination and return its address
pub async fn start_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}

/// An address nothing listens on
pub async fn unused_addr() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr
}

/// Files referenced by configs built here; never read when material is supplied
fn unused_tls() -> TlsConfig {
    TlsConfig {
        ca_cert: "unused-ca.pem".into(),
        cert: "unused-cert.pem".into(),
        key: "unused-key.pem".into(),
    }
}

/// Server config on an ephemeral loopback port
pub fn server_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        max_connections: None,
        tls: unused_tls(),
        tcp: TcpConfig::default(),
    }
}

/// Client config on an ephemeral loopback port, pointing at `remote_addr`
pub fn client_config(remote_addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        remote_addr: remote_addr.to_string(),
        server_name: "localhost".to_string(),
        max_connections: None,
        tls: unused_tls(),
        tcp: TcpConfig::default(),
    }
}

/// Throwaway PKI: one trust root, a server and a client certificate
pub mod pki {
    use super::TlsMaterial;
    use rcgen::{
        BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
        KeyPair, KeyUsagePurpose,
    };

    /// A certificate authority that can issue leaf certificates
    pub struct TestCa {
        cert: Certificate,
        key: KeyPair,
    }

    impl TestCa {
        /// Create a self-signed root
        pub fn new(name: &str) -> Self {
            let key = KeyPair::generate().unwrap();
            let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.distinguished_name.push(DnType::CommonName, name);
            params.key_usages = vec![
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
                KeyUsagePurpose::DigitalSignature,
            ];
            let cert = params.self_signed(&key).unwrap();
            TestCa { cert, key }
        }

        /// Root certificate PEM
        pub fn pem(&self) -> String {
            self.cert.pem()
        }

        fn issue(&self, name: &str, usage: ExtendedKeyUsagePurpose) -> (String, String) {
            let key = KeyPair::generate().unwrap();
            let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
            params.distinguished_name.push(DnType::CommonName, name);
            params.extended_key_usages = vec![usage];
            let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
            (cert.pem(), key.serialize_pem())
        }

        /// Server material for `name`, trusting this root
        pub fn server_material(&self, name: &str) -> TlsMaterial {
            let (cert, key) = self.issue(name, ExtendedKeyUsagePurpose::ServerAuth);
            TlsMaterial::from_pem(self.pem(), cert, key)
        }

        /// Client material for `name`, trusting this root
        pub fn client_material(&self, name: &str) -> TlsMaterial {
            let (cert, key) = self.issue(name, ExtendedKeyUsagePurpose::ClientAuth);
            TlsMaterial::from_pem(self.pem(), cert, key)
        }

        /// Client material issued by this root that trusts `root`
        pub fn client_material_trusting(&self, name: &str, root: &TestCa) -> TlsMaterial {
            let (cert, key) = self.issue(name, ExtendedKeyUsagePurpose::ClientAuth);
            TlsMaterial::from_pem(root.pem(), cert, key)
        }
    }
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use std::net::SocketAddr;
    use tlsocks::socks::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to a loopback socket address
    pub fn create_connect_to(addr: SocketAddr) -> Vec<u8> {
        match addr {
            SocketAddr::V4(v4) => create_connect_ipv4(v4.ip().octets(), v4.port()),
            SocketAddr::V6(_) => panic!("IPv6 destinations are not supported"),
        }
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command with an IPv6 destination
    pub fn create_connect_ipv6(port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV6,
        ];
        cmd.extend_from_slice(&[0u8; 15]);
        cmd.push(1);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Expected success reply
    pub fn success_reply() -> [u8; SOCKS5_REPLY_LEN] {
        [SOCKS5_VERSION, 0x00, SOCKS5_RESERVED, SOCKS5_ADDR_TYPE_IPV4, 0, 0, 0, 0, 0, 0]
    }
}
