//! Bidirectional relay between an accepted connection and its peer
//!
//! The remote-to-client direction runs on its own task. The client-to-remote
//! direction runs on the caller's task and decides the lifetime of the relay:
//! once it ends, the remote is shut down for writing, the other direction is
//! cancelled and both streams close.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Bytes moved in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Client to remote, including any pre-read bytes
    pub upstream: u64,
    /// Remote to client, as far as it got before cancellation
    pub downstream: u64,
}

/// Relay `client` and `remote` until the client side stops sending.
///
/// `pending` holds bytes already read from the client that belong to the
/// remote; they are written before any further client data.
pub async fn relay<A, B>(client: A, remote: B, pending: Bytes) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let downstream = tokio::spawn(async move {
        let result = tokio::io::copy(&mut remote_read, &mut client_write).await;
        let _ = client_write.shutdown().await;
        result
    });

    let upstream = async {
        if !pending.is_empty() {
            remote_write.write_all(&pending).await?;
        }
        let copied = tokio::io::copy(&mut client_read, &mut remote_write).await?;
        Ok::<u64, std::io::Error>(copied + pending.len() as u64)
    }
    .await;
    // Lets a TLS remote send close_notify before the stream drops
    let _ = remote_write.shutdown().await;

    let mut stats = RelayStats::default();
    match upstream {
        Ok(bytes) => {
            debug!("Client->remote finished: {} bytes", bytes);
            stats.upstream = bytes;
        }
        Err(e) => debug!("Client->remote error: {}", e),
    }

    // A finished task is not affected by abort and still yields its result.
    downstream.abort();
    match downstream.await {
        Ok(Ok(bytes)) => {
            debug!("Remote->client finished: {} bytes", bytes);
            stats.downstream = bytes;
        }
        Ok(Err(e)) => debug!("Remote->client error: {}", e),
        Err(_) => debug!("Remote->client cancelled"),
    }

    stats
}
