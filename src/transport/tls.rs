//! TLS material and rustls configuration
//!
//! Both tunnel roles authenticate each other against the same trust root:
//! the server requires and verifies a client certificate, the client trusts
//! only that root and presents its own certificate. PEM bytes are supplied
//! by the caller, either directly or from the files named in [`TlsConfig`].

use super::{connect_tcp, SocketOpts};
use crate::config::TlsConfig;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::TlsConnector;

/// TLS stream produced by [`TlsDialer`]
pub type ClientTlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// PEM-encoded trust root, certificate chain and private key
#[derive(Clone)]
pub struct TlsMaterial {
    ca_pem: Vec<u8>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_pem", &format_args!("{} bytes", self.ca_pem.len()))
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

impl TlsMaterial {
    /// Build from in-memory PEM bytes
    pub fn from_pem(
        ca_pem: impl Into<Vec<u8>>,
        cert_pem: impl Into<Vec<u8>>,
        key_pem: impl Into<Vec<u8>>,
    ) -> Self {
        TlsMaterial {
            ca_pem: ca_pem.into(),
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        }
    }

    /// Read the PEM files named in the configuration
    pub fn load(config: &TlsConfig) -> Result<Self> {
        let read = |path: &std::path::Path| {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        };

        Ok(TlsMaterial {
            ca_pem: read(&config.ca_cert)?,
            cert_pem: read(&config.cert)?,
            key_pem: read(&config.key)?,
        })
    }

    fn roots(&self) -> Result<RootCertStore> {
        let mut store = RootCertStore::empty();
        for cert in parse_certs(&self.ca_pem).context("Failed to parse trust root")? {
            store
                .add(cert)
                .context("Failed to add certificate to trust root")?;
        }
        Ok(store)
    }

    fn cert_chain(&self) -> Result<Vec<CertificateDer<'static>>> {
        parse_certs(&self.cert_pem).context("Failed to parse certificate chain")
    }

    fn private_key(&self) -> Result<PrivateKeyDer<'static>> {
        rustls_pemfile::private_key(&mut self.key_pem.as_slice())
            .context("Failed to parse private key")?
            .ok_or_else(|| anyhow!("No private key found"))
    }
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut &pem[..]).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        anyhow::bail!("No certificates found");
    }
    Ok(certs)
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

/// Server-role configuration: mutual TLS against the trust root
pub fn server_config(material: &TlsMaterial) -> Result<Arc<ServerConfig>> {
    let roots = Arc::new(material.roots()?);
    let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider())
        .build()
        .context("Failed to build client certificate verifier")?;

    let config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .context("Unsupported TLS protocol versions")?
        .with_client_cert_verifier(verifier)
        .with_single_cert(material.cert_chain()?, material.private_key()?)
        .context("Invalid server certificate or key")?;

    Ok(Arc::new(config))
}

/// Client-role configuration: trusts only the root, presents a client certificate
pub fn client_config(material: &TlsMaterial) -> Result<Arc<ClientConfig>> {
    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .context("Unsupported TLS protocol versions")?
        .with_root_certificates(material.roots()?)
        .with_client_auth_cert(material.cert_chain()?, material.private_key()?)
        .context("Invalid client certificate or key")?;

    Ok(Arc::new(config))
}

/// Dials the tunnel server over TLS, pinned to an expected server name
#[derive(Clone)]
pub struct TlsDialer {
    connector: TlsConnector,
    server_name: ServerName<'static>,
    socket_opts: SocketOpts,
}

impl std::fmt::Debug for TlsDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsDialer")
            .field("server_name", &self.server_name)
            .field("socket_opts", &self.socket_opts)
            .finish()
    }
}

impl TlsDialer {
    /// Create a dialer that verifies the peer as `server_name`
    pub fn new(config: Arc<ClientConfig>, server_name: &str, socket_opts: SocketOpts) -> Result<Self> {
        let server_name = ServerName::try_from(server_name.to_string())
            .with_context(|| format!("Invalid server name: {}", server_name))?;

        Ok(TlsDialer {
            connector: TlsConnector::from(config),
            server_name,
            socket_opts,
        })
    }

    /// Connect to `addr` and complete the TLS handshake
    pub async fn connect(&self, addr: &str) -> Result<ClientTlsStream> {
        let tcp_stream = connect_tcp(addr, &self.socket_opts)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;

        let tls_stream = self
            .connector
            .connect(self.server_name.clone(), tcp_stream)
            .await
            .with_context(|| format!("TLS handshake failed with {}", addr))?;

        tracing::debug!("TLS connection established to {}", addr);
        Ok(tls_stream)
    }
}
