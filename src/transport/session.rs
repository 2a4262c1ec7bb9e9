//! Per-connection session state machine.
//!
//! # States
//!
//! ```text
//! Accepted → AwaitingRequest → Validating → Generating → Responding ─┐
//!                 ▲                 │                                │
//!                 │                 └──── (invalid) ──→ Responding ──┤
//!                 └──────────────────────────────────────────────────┘
//!                                      any I/O failure, EOF, timeout → Closed
//! ```
//!
//! A session serves any number of requests. An invalid request is answered
//! with an `ERROR:` line and the session keeps waiting, up to
//! [`SessionPolicy::max_invalid_requests`] consecutive invalid requests.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{Instrument, debug, debug_span, trace, warn};
use uuid::Uuid;

use crate::error::{Error, ValidationReason};
use crate::protocol::{
    LineRead, MAX_REQUEST_LINE, TableRequest, encode_error, encode_table, read_line_bounded,
};
use crate::table::TableGenerator;

// ============================================================================
// Constants
// ============================================================================

/// Reason sent when the randomness source fails.
pub const GENERATION_FAILED: &str = "generation-failed";

/// Default idle time allowed between requests.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time allowed to write one response.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default consecutive invalid requests tolerated.
pub const DEFAULT_MAX_INVALID_REQUESTS: u32 = 3;

/// Default largest range a request may cover.
pub const DEFAULT_MAX_RANGE_LEN: u64 = 1_000_000;

// ============================================================================
// SessionPolicy
// ============================================================================

/// Limits applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Consecutive invalid requests before the session is closed.
    pub max_invalid_requests: u32,
    /// Longest wait for the next request line.
    pub idle_timeout: Duration,
    /// Longest time to write one response.
    pub write_timeout: Duration,
    /// Largest `max - min + 1` accepted.
    pub max_range_len: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_invalid_requests: DEFAULT_MAX_INVALID_REQUESTS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_range_len: DEFAULT_MAX_RANGE_LEN,
        }
    }
}

// ============================================================================
// SessionState / CloseReason
// ============================================================================

/// Where a session is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, nothing read yet.
    Accepted,
    /// Waiting for a request line.
    AwaitingRequest,
    /// Parsing and checking a request line.
    Validating,
    /// Drawing a table from the randomness source.
    Generating,
    /// Writing the response.
    Responding,
    /// Terminal.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed its side.
    PeerClosed,
    /// No request within the idle timeout.
    IdleTimeout,
    /// Response could not be written within the write timeout.
    WriteTimeout,
    /// Too many consecutive invalid requests.
    TooManyInvalidRequests,
    /// Request line longer than [`MAX_REQUEST_LINE`].
    LineTooLong,
    /// Read or write failed.
    Io,
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identifier used in logs.
    pub id: Uuid,
    /// Tables successfully written.
    pub tables_served: u64,
    /// `ERROR:` lines written.
    pub errors_sent: u64,
    /// Why the session ended.
    pub reason: CloseReason,
}

// ============================================================================
// Session
// ============================================================================

/// One accepted connection.
pub struct Session<S> {
    stream: S,
    peer: Option<SocketAddr>,
    core: SessionCore,
}

/// Everything but the stream, so the stream can be split while the state
/// machine stays mutable.
struct SessionCore {
    id: Uuid,
    generator: TableGenerator,
    policy: SessionPolicy,
    state: SessionState,
    consecutive_invalid: u32,
    tables_served: u64,
    errors_sent: u64,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Creates a session over `stream`.
    #[must_use]
    pub fn new(stream: S, generator: TableGenerator, policy: SessionPolicy) -> Self {
        Self {
            stream,
            peer: None,
            core: SessionCore {
                id: Uuid::new_v4(),
                generator,
                policy,
                state: SessionState::Accepted,
                consecutive_invalid: 0,
                tables_served: 0,
                errors_sent: 0,
            },
        }
    }

    /// Records the peer address for logs.
    #[inline]
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Session identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Drives the session until it closes.
    pub async fn run(self) -> SessionSummary {
        let span = debug_span!("session", id = %self.core.id, peer = ?self.peer);
        let Self { stream, core, .. } = self;
        core.drive(stream).instrument(span).await
    }
}

impl SessionCore {
    async fn drive<S>(mut self, stream: S) -> SessionSummary
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        self.transition(SessionState::AwaitingRequest);

        let reason = loop {
            let read = timeout(
                self.policy.idle_timeout,
                read_line_bounded(&mut reader, &mut line, MAX_REQUEST_LINE),
            )
            .await;

            let reply = match read {
                Err(_) => break CloseReason::IdleTimeout,
                Ok(Err(e)) => {
                    debug!(error = %e, "Read failed");
                    break CloseReason::Io;
                }
                Ok(Ok(LineRead::Eof)) => break CloseReason::PeerClosed,
                Ok(Ok(LineRead::TooLong)) => {
                    warn!(limit = MAX_REQUEST_LINE, "Request line too long");
                    break CloseReason::LineTooLong;
                }
                Ok(Ok(LineRead::Line)) => self.handle_line(&line).await,
                Ok(Ok(LineRead::NotUtf8)) => {
                    self.transition(SessionState::Validating);
                    self.reject(ValidationReason::NonNumeric, "<non-utf-8>")
                }
            };

            self.transition(SessionState::Responding);
            let written = timeout(self.policy.write_timeout, async {
                write_half.write_all(reply.as_bytes()).await?;
                write_half.flush().await
            })
            .await;

            match written {
                Err(_) => break CloseReason::WriteTimeout,
                Ok(Err(e)) => {
                    debug!(error = %e, "Write failed");
                    break CloseReason::Io;
                }
                Ok(Ok(())) => {}
            }

            if self.consecutive_invalid >= self.policy.max_invalid_requests {
                warn!(
                    count = self.consecutive_invalid,
                    "Closing session after repeated invalid requests"
                );
                break CloseReason::TooManyInvalidRequests;
            }

            self.transition(SessionState::AwaitingRequest);
        };

        let _ = timeout(self.policy.write_timeout, write_half.shutdown()).await;
        self.transition(SessionState::Closed);

        debug!(
            ?reason,
            tables = self.tables_served,
            errors = self.errors_sent,
            "Session closed"
        );

        SessionSummary {
            id: self.id,
            tables_served: self.tables_served,
            errors_sent: self.errors_sent,
            reason,
        }
    }

    /// Validates and serves one request line, returning the reply.
    async fn handle_line(&mut self, line: &str) -> String {
        self.transition(SessionState::Validating);

        let request = match self.validate(line) {
            Ok(request) => request,
            Err(reason) => return self.reject(reason, line),
        };
        self.consecutive_invalid = 0;

        self.transition(SessionState::Generating);
        match self.generator.generate(&request).await {
            Ok(table) => {
                self.tables_served += 1;
                debug!(%request, rows = table.row_count(), "Serving table");
                encode_table(&table)
            }
            Err(e) => {
                self.errors_sent += 1;
                warn!(%request, error = %e, "Table generation failed");
                encode_error(GENERATION_FAILED)
            }
        }
    }

    fn reject(&mut self, reason: ValidationReason, line: &str) -> String {
        self.consecutive_invalid += 1;
        self.errors_sent += 1;
        debug!(%reason, line = line.trim_end(), "Invalid request");
        encode_error(reason)
    }

    fn validate(&self, line: &str) -> Result<TableRequest, ValidationReason> {
        let reason_of = |e: Error| e.validation_reason().unwrap_or(ValidationReason::NonNumeric);

        let request = TableRequest::parse(line).map_err(reason_of)?;
        request
            .check_range_limit(self.policy.max_range_len)
            .map_err(reason_of)?;

        Ok(request)
    }

    fn transition(&mut self, next: SessionState) {
        trace!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt as _};
    use tokio_test::io::Builder;

    use crate::error::Result;
    use crate::randomness::{LocalRandomSource, RandomnessSource};

    /// Returns the range in ascending order so replies are predictable.
    #[derive(Debug)]
    struct OrderedSource;

    #[async_trait]
    impl RandomnessSource for OrderedSource {
        async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
            Ok((min..=max).collect())
        }

        fn name(&self) -> &'static str {
            "ordered"
        }
    }

    #[derive(Debug)]
    struct BrokenSource;

    #[async_trait]
    impl RandomnessSource for BrokenSource {
        async fn permutation(&self, _min: i64, _max: i64) -> Result<Vec<i64>> {
            Err(Error::generation("entropy service timed out"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn ordered() -> TableGenerator {
        TableGenerator::new(Arc::new(OrderedSource))
    }

    #[tokio::test]
    async fn test_serves_table_then_closes_on_eof() {
        let stream = Builder::new()
            .read(b"1,5,3\n")
            .write(b"1\t2\t3\n4\t5\n\n")
            .build();

        let summary = Session::new(stream, ordered(), SessionPolicy::default()).run().await;

        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.tables_served, 1);
        assert_eq!(summary.errors_sent, 0);
    }

    #[tokio::test]
    async fn test_invalid_requests_keep_session_open() {
        let stream = Builder::new()
            .read(b"abc,10,5\n")
            .write(b"ERROR: non-numeric\n")
            .read(b"10,5,3\n")
            .write(b"ERROR: empty-range\n")
            .read(b"1,4,2\n")
            .write(b"1\t2\n3\t4\n\n")
            .build();

        let summary = Session::new(stream, ordered(), SessionPolicy::default()).run().await;

        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.tables_served, 1);
        assert_eq!(summary.errors_sent, 2);
    }

    #[tokio::test]
    async fn test_invalid_request_ceiling_closes_session() {
        let stream = Builder::new()
            .read(b"1,10,0\n")
            .write(b"ERROR: invalid-columns\n")
            .read(b"x\n")
            .write(b"ERROR: non-numeric\n")
            .build();

        let policy = SessionPolicy {
            max_invalid_requests: 2,
            ..SessionPolicy::default()
        };
        let summary = Session::new(stream, ordered(), policy).run().await;

        assert_eq!(summary.reason, CloseReason::TooManyInvalidRequests);
        assert_eq!(summary.errors_sent, 2);
    }

    #[tokio::test]
    async fn test_valid_request_resets_invalid_count() {
        let stream = Builder::new()
            .read(b"x\n")
            .write(b"ERROR: non-numeric\n")
            .read(b"1,2,1\n")
            .write(b"1\n2\n\n")
            .read(b"y\n")
            .write(b"ERROR: non-numeric\n")
            .build();

        let policy = SessionPolicy {
            max_invalid_requests: 2,
            ..SessionPolicy::default()
        };
        let summary = Session::new(stream, ordered(), policy).run().await;

        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.errors_sent, 2);
    }

    #[tokio::test]
    async fn test_range_limit() {
        let stream = Builder::new()
            .read(b"1,1001,10\n")
            .write(b"ERROR: range-too-large\n")
            .build();

        let policy = SessionPolicy {
            max_range_len: 1000,
            ..SessionPolicy::default()
        };
        let summary = Session::new(stream, ordered(), policy).run().await;
        assert_eq!(summary.errors_sent, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported_and_session_survives() {
        let stream = Builder::new()
            .read(b"1,10,5\n")
            .write(b"ERROR: generation-failed\n")
            .read(b"1,10,5\n")
            .write(b"ERROR: generation-failed\n")
            .read(b"1,10,5\n")
            .write(b"ERROR: generation-failed\n")
            .read(b"1,10,5\n")
            .write(b"ERROR: generation-failed\n")
            .build();

        let generator = TableGenerator::new(Arc::new(BrokenSource));
        let summary = Session::new(stream, generator, SessionPolicy::default()).run().await;

        // generation failures do not count toward the invalid-request ceiling
        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.errors_sent, 4);
    }

    #[tokio::test]
    async fn test_non_utf8_request_is_rejected_and_session_survives() {
        let stream = Builder::new()
            .read(b"\xff,10,5\n")
            .write(b"ERROR: non-numeric\n")
            .read(b"1,4,2\n")
            .write(b"1\t2\n3\t4\n\n")
            .build();

        let summary = Session::new(stream, ordered(), SessionPolicy::default()).run().await;

        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.errors_sent, 1);
        assert_eq!(summary.tables_served, 1);
    }

    #[tokio::test]
    async fn test_non_utf8_requests_count_toward_ceiling() {
        let stream = Builder::new()
            .read(b"\xfe\n")
            .write(b"ERROR: non-numeric\n")
            .read(b"1,\xc3\x28,2\n")
            .write(b"ERROR: non-numeric\n")
            .build();

        let policy = SessionPolicy {
            max_invalid_requests: 2,
            ..SessionPolicy::default()
        };
        let summary = Session::new(stream, ordered(), policy).run().await;

        assert_eq!(summary.reason, CloseReason::TooManyInvalidRequests);
        assert_eq!(summary.errors_sent, 2);
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_served() {
        let (client, server) = tokio::io::duplex(1024);
        let handle = tokio::spawn(Session::new(server, ordered(), SessionPolicy::default()).run());

        let (read, mut write) = tokio::io::split(client);
        let mut reader = tokio::io::BufReader::new(read);

        write.write_all(b"1,2,2").await.expect("write");
        write.shutdown().await.expect("shutdown");

        let response = crate::protocol::read_response(&mut reader, 1024)
            .await
            .expect("response");
        assert_eq!(
            response,
            crate::protocol::Response::Table(crate::table::RandomTable::from_rows(vec![vec![1, 2]]))
        );

        let summary = handle.await.expect("join");
        assert_eq!(summary.tables_served, 1);
        assert_eq!(summary.reason, CloseReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_overlong_line_closes_session() {
        let long = vec![b'1'; MAX_REQUEST_LINE + 10];
        let stream = Builder::new().read(&long).build();

        let summary = Session::new(stream, ordered(), SessionPolicy::default()).run().await;
        assert_eq!(summary.reason, CloseReason::LineTooLong);
    }

    #[tokio::test]
    async fn test_idle_peer_times_out() {
        let (client, server) = tokio::io::duplex(1024);

        let policy = SessionPolicy {
            idle_timeout: Duration::from_millis(50),
            ..SessionPolicy::default()
        };
        let summary = Session::new(server, ordered(), policy).run().await;

        assert_eq!(summary.reason, CloseReason::IdleTimeout);
        drop(client);
    }

    #[tokio::test]
    async fn test_duplex_exchange_with_random_source() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let generator = TableGenerator::new(Arc::new(LocalRandomSource::new()));
        let handle = tokio::spawn(Session::new(server, generator, SessionPolicy::default()).run());

        let (read, mut write) = tokio::io::split(client);
        let mut reader = tokio::io::BufReader::new(read);

        write.write_all(b"10,36,6\n").await.expect("write");
        let response = crate::protocol::read_response(&mut reader, 1 << 20)
            .await
            .expect("response");
        let crate::protocol::Response::Table(table) = response else {
            panic!("expected a table, got {response:?}");
        };
        let request = TableRequest::new(10, 36, 6).expect("valid");
        assert!(table.covers(&request));

        write.shutdown().await.expect("shutdown");
        let mut rest = String::new();
        reader.read_line(&mut rest).await.expect("eof");
        assert!(rest.is_empty());

        let summary = handle.await.expect("join");
        assert_eq!(summary.tables_served, 1);
        assert_eq!(summary.reason, CloseReason::PeerClosed);
    }
}
