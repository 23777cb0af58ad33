//! SOCKS5 session handler (server role)
//!
//! Drives one accepted connection through method negotiation, the request,
//! the destination dial and finally the relay. Every failure ends only the
//! session it happened in.

use super::relay::relay;
use crate::error::{Socks5Error, Socks5ReplyCode, TunnelError};
use crate::server::{Handler, StreamDyn};
use crate::socks::{SocksCommand, Socks5Request, MAX_SOCKS5_BUF_LEN};
use crate::transport::{connect_tcp, SocketOpts};
use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

type ParseFn = fn(&mut Socks5Request, &[u8]) -> Result<usize, Socks5Error>;

/// [`Handler`] that serves SOCKS5 on every accepted connection
#[derive(Debug, Clone, Default)]
pub struct Socks5Handler {
    socket_opts: SocketOpts,
}

impl Socks5Handler {
    /// Create a handler that dials destinations with `socket_opts`
    pub fn new(socket_opts: SocketOpts) -> Self {
        Socks5Handler { socket_opts }
    }
}

#[async_trait::async_trait]
impl Handler for Socks5Handler {
    fn name(&self) -> &str {
        "socks5"
    }

    async fn handle(&self, stream: Box<dyn StreamDyn>, peer: SocketAddr) -> Result<()> {
        Session::new(stream, peer, self.socket_opts.clone())
            .run()
            .await
    }
}

/// Per-connection SOCKS5 state machine
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
    buf: BytesMut,
    request: Socks5Request,
    socket_opts: SocketOpts,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an accepted stream
    pub fn new(stream: S, peer: SocketAddr, socket_opts: SocketOpts) -> Self {
        Session {
            stream,
            peer,
            buf: BytesMut::with_capacity(MAX_SOCKS5_BUF_LEN),
            request: Socks5Request::new(),
            socket_opts,
        }
    }

    /// Run the session to completion.
    ///
    /// Returns `Ok(())` for a finished relay and for a peer that hangs up
    /// before sending a complete message; any other failure is returned
    /// after the connection has been answered as far as the protocol allows.
    pub async fn run(mut self) -> Result<()> {
        // Method negotiation. A malformed handshake gets no reply.
        match self.read_message(Socks5Request::parse_handshake).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("{} closed before handshake", self.peer);
                return Ok(());
            }
            Err(e) => return Err(e).context("SOCKS5 handshake failed"),
        }
        let reply = self.request.handshake_reply();
        self.write_flush(&reply).await?;

        // Request. A malformed request is answered with its status.
        match self.read_message(Socks5Request::parse_request).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("{} closed before request", self.peer);
                return Ok(());
            }
            Err(TunnelError::Socks5(e)) => {
                self.write_flush(&Socks5Request::reply_with(e.reply_code()))
                    .await?;
                return Err(e).context("Invalid SOCKS5 request");
            }
            Err(e) => return Err(e).context("Failed to read SOCKS5 request"),
        }

        let command = self.request.command();
        if command != Some(SocksCommand::Connect) {
            self.write_flush(&Socks5Request::reply_with(
                Socks5ReplyCode::CommandNotSupported,
            ))
            .await?;
            anyhow::bail!("Unsupported SOCKS5 command from {}: {:?}", self.peer, command);
        }

        let addr = self.request.address();
        debug!("{} requests CONNECT {}", self.peer, addr);

        let remote = match connect_tcp(&addr, &self.socket_opts).await {
            Ok(remote) => remote,
            Err(e) => {
                self.write_flush(&Socks5Request::reply_with(Socks5ReplyCode::from(&e)))
                    .await?;
                return Err(e).with_context(|| format!("Failed to connect to {}", addr));
            }
        };

        let reply = self.request.reply();
        self.write_flush(&reply).await?;
        info!("SOCKS5 tunnel established: {} -> {}", self.peer, addr);

        let Session {
            stream, peer, buf, ..
        } = self;
        let stats = relay(stream, remote, buf.freeze()).await;
        debug!(
            "SOCKS5 tunnel closed: {} -> {} ({} bytes up, {} bytes down)",
            peer, addr, stats.upstream, stats.downstream
        );

        Ok(())
    }

    /// Read until `parse` accepts the buffered bytes.
    ///
    /// Consumed bytes are removed from the buffer; anything after them stays
    /// for the next phase. Returns `Ok(false)` on end-of-stream.
    async fn read_message(&mut self, parse: ParseFn) -> Result<bool, TunnelError> {
        loop {
            if !self.buf.is_empty() {
                match parse(&mut self.request, &self.buf) {
                    Ok(consumed) => {
                        self.buf.advance(consumed);
                        return Ok(true);
                    }
                    Err(e) if e.is_incomplete() => {
                        if self.buf.len() >= MAX_SOCKS5_BUF_LEN {
                            return Err(Socks5Error::MessageTooLarge(self.buf.len()).into());
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            let read = (&mut self.stream)
                .take((MAX_SOCKS5_BUF_LEN - self.buf.len()) as u64)
                .read_buf(&mut self.buf)
                .await;
            match read {
                Ok(0) => return Ok(false),
                Ok(_) => {}
                // TLS peers that hang up without close_notify
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn write_flush(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }
}
