//! Listener and accept loop
//!
//! A [`ConnectionServer`] binds a plain TCP or TLS endpoint and runs one
//! accept loop per [`serve`](ConnectionServer::serve) call. Transient accept
//! errors are retried with [`AcceptBackoff`]; the first fatal error is pushed
//! onto the server's single-slot error channel and ends the loop.

use super::backoff::AcceptBackoff;
use super::{Handler, StreamDyn};
use crate::error::TunnelError;
use crate::transport::SocketOpts;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Whether an accept error is worth retrying.
///
/// Covers aborted handshakes, interrupted calls and descriptor/memory
/// exhaustion; everything else is fatal for the listener.
pub fn is_transient(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut
        | io::ErrorKind::OutOfMemory => true,
        _ => matches!(err.raw_os_error(), Some(code) if is_resource_exhaustion(code)),
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(code: i32) -> bool {
    // ENOMEM, ENFILE, EMFILE have the same values on every unix target
    matches!(code, 12 | 23 | 24)
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_code: i32) -> bool {
    false
}

/// Connection server bound to one address
pub struct ConnectionServer {
    /// Address to listen on
    laddr: String,
    /// Present for TLS listeners
    tls: Option<TlsAcceptor>,
    /// Options applied to every accepted TCP stream
    socket_opts: SocketOpts,
    /// Admission gate in front of dispatch
    max_connections: Option<usize>,
    /// Fatal error channel (capacity 1)
    err_tx: mpsc::Sender<TunnelError>,
    err_rx: mpsc::Receiver<TunnelError>,
}

impl std::fmt::Debug for ConnectionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionServer")
            .field("laddr", &self.laddr)
            .field("tls", &self.is_tls())
            .field("socket_opts", &self.socket_opts)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl ConnectionServer {
    fn new(laddr: String, tls: Option<TlsAcceptor>) -> Self {
        let (err_tx, err_rx) = mpsc::channel(1);
        ConnectionServer {
            laddr,
            tls,
            socket_opts: SocketOpts::default(),
            max_connections: None,
            err_tx,
            err_rx,
        }
    }

    /// Create a plain TCP server, not yet listening
    pub fn tcp(laddr: impl Into<String>) -> Self {
        ConnectionServer::new(laddr.into(), None)
    }

    /// Create a TLS server, not yet listening
    pub fn tls(laddr: impl Into<String>, config: Arc<ServerConfig>) -> Self {
        ConnectionServer::new(laddr.into(), Some(TlsAcceptor::from(config)))
    }

    /// Set socket options for accepted streams
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Bound the number of concurrently handled connections.
    ///
    /// A limit of zero would never admit a connection and is treated as
    /// unbounded.
    pub fn with_max_connections(mut self, limit: Option<usize>) -> Self {
        self.max_connections = limit.filter(|n| *n > 0);
        self
    }

    /// Configured listen address
    pub fn addr(&self) -> &str {
        &self.laddr
    }

    /// Whether accepted connections are TLS-terminated
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Bind the listener and start the accept loop.
    ///
    /// A bind failure is also pushed onto the error channel, so an owner
    /// blocked in [`wait`](Self::wait) observes it as well.
    pub async fn serve(&self, handler: Arc<dyn Handler>) -> Result<ListenerHandle, TunnelError> {
        let listener = match TcpListener::bind(&self.laddr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind {}: {}", self.laddr, e);
                self.report(TunnelError::Bind {
                    addr: self.laddr.clone(),
                    source: io::Error::new(e.kind(), e.to_string()),
                });
                return Err(TunnelError::Bind {
                    addr: self.laddr.clone(),
                    source: e,
                });
            }
        };

        let local_addr = listener.local_addr()?;
        info!(
            "{} listening on {} ({})",
            handler.name(),
            local_addr,
            if self.is_tls() { "tls" } else { "tcp" }
        );

        let cancel = CancellationToken::new();
        let accept_loop = AcceptLoop {
            acceptor: TcpAccept {
                listener,
                socket_opts: self.socket_opts.clone(),
            },
            local_addr,
            tls: self.tls.clone(),
            handler,
            limiter: self.max_connections.map(|n| Arc::new(Semaphore::new(n))),
            err_tx: self.err_tx.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(accept_loop.run());

        Ok(ListenerHandle {
            local_addr,
            cancel,
            task,
        })
    }

    /// Fatal error channel; receiving from it waits for server termination
    pub fn errors(&mut self) -> &mut mpsc::Receiver<TunnelError> {
        &mut self.err_rx
    }

    /// Wait for the fatal error that ended this server
    pub async fn wait(&mut self) -> TunnelError {
        self.err_rx
            .recv()
            .await
            .unwrap_or(TunnelError::ListenerClosed)
    }

    fn report(&self, err: TunnelError) {
        if let Err(e) = self.err_tx.try_send(err) {
            debug!("Error channel full, dropping: {}", e);
        }
    }
}

/// Handle to a running accept loop
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listener.
    ///
    /// The accept loop reports [`TunnelError::ListenerClosed`] and exits;
    /// connections already dispatched keep running.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the accept loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the accept loop to exit
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            warn!("Accept loop for {} panicked: {}", self.local_addr, e);
        }
    }
}

/// Source of accepted connections
#[async_trait::async_trait]
trait Accept: Send + 'static {
    type Stream: StreamDyn + 'static;

    async fn accept(&mut self) -> io::Result<(Self::Stream, SocketAddr)>;
}

struct TcpAccept {
    listener: TcpListener,
    socket_opts: SocketOpts,
}

#[async_trait::async_trait]
impl Accept for TcpAccept {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to apply socket options for {}: {}", peer, e);
        }
        Ok((stream, peer))
    }
}

struct AcceptLoop<A> {
    acceptor: A,
    local_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
    handler: Arc<dyn Handler>,
    limiter: Option<Arc<Semaphore>>,
    err_tx: mpsc::Sender<TunnelError>,
    cancel: CancellationToken,
}

impl<A: Accept> AcceptLoop<A> {
    async fn run(mut self) {
        let mut backoff = AcceptBackoff::default();

        loop {
            if self.cancel.is_cancelled() {
                self.report(TunnelError::ListenerClosed);
                return;
            }

            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => continue,
                accepted = self.acceptor.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    backoff.reset();
                    debug!("Accepted connection from {} on {}", peer, self.local_addr);
                    let Some(permit) = self.admit().await else {
                        continue;
                    };
                    self.dispatch(stream, peer, permit);
                }
                Err(e) if is_transient(&e) => {
                    let delay = backoff.next_delay();
                    warn!("Accept error: {}; retrying in {:?}", e, delay);
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    error!("Accept error on {}: {}", self.local_addr, e);
                    self.report(TunnelError::Accept(e));
                    self.cancel.cancel();
                    return;
                }
            }
        }
    }

    /// Wait for a free slot; `None` means the listener was closed meanwhile.
    async fn admit(&self) -> Option<Option<OwnedSemaphorePermit>> {
        let Some(limiter) = &self.limiter else {
            return Some(None);
        };

        tokio::select! {
            _ = self.cancel.cancelled() => None,
            permit = limiter.clone().acquire_owned() => permit.ok().map(Some),
        }
    }

    fn dispatch(&self, stream: A::Stream, peer: SocketAddr, permit: Option<OwnedSemaphorePermit>) {
        let handler = self.handler.clone();
        let tls = self.tls.clone();

        tokio::spawn(async move {
            let _permit = permit;

            let stream: Box<dyn StreamDyn> = match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => Box::new(tls_stream),
                    Err(e) => {
                        warn!("TLS handshake with {} failed: {}", peer, e);
                        return;
                    }
                },
                None => Box::new(stream),
            };

            if let Err(e) = handler.handle(stream, peer).await {
                warn!("{} connection from {} failed: {:#}", handler.name(), peer, e);
            }
            debug!("{} connection from {} closed", handler.name(), peer);
        });
    }

    fn report(&self, err: TunnelError) {
        if let Err(e) = self.err_tx.try_send(err) {
            debug!("Error channel full, dropping: {}", e);
        }
    }
}
