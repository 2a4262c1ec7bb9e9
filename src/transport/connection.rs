//! Client side of a table session.
//!
//! One [`TableConnection`] carries any number of request/response exchanges.
//! After any error the connection state is unknown and it should be dropped.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{Response, TableRequest, read_response};

// ============================================================================
// TableConnection
// ============================================================================

/// An open connection to a table server.
#[derive(Debug)]
pub struct TableConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl TableConnection {
    /// Connects to `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the connection is not established in time
    /// - [`Error::Connection`] if the address does not resolve or the server
    ///   refuses
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::timeout(format!("connect {addr}"), millis(connect_timeout)))?
            .map_err(|e| Error::connection(format!("{addr}: {e}")))?;

        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let (read, writer) = stream.into_split();
        debug!(%peer, "Connected to table server");

        Ok(Self {
            reader: BufReader::new(read),
            writer,
            peer,
        })
    }

    /// Address of the server.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends `request` and reads its response.
    ///
    /// `response_timeout` covers both the write and the full response.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the exchange does not finish in time
    /// - [`Error::ConnectionClosed`] if the server hangs up mid-exchange
    /// - [`Error::Protocol`] if the response is malformed or larger than
    ///   `max_bytes`
    pub async fn exchange(
        &mut self,
        request: &TableRequest,
        response_timeout: Duration,
        max_bytes: usize,
    ) -> Result<Response> {
        let line = request.to_line();
        trace!(peer = %self.peer, request = %request, "Sending request");

        timeout(response_timeout, async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await?;
            read_response(&mut self.reader, max_bytes).await
        })
        .await
        .map_err(|_| Error::timeout("table exchange", millis(response_timeout)))?
    }

    /// Closes the write side so the server sees end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the shutdown fails.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[inline]
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
