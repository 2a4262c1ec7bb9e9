//! Response encoding and framed reads.
//!
//! Both sides read with a byte ceiling, so a peer that never sends a newline
//! cannot make the reader buffer without bound.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::{self, Write as _};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{Error, Result};
use crate::table::RandomTable;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of an error response line.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Longest request line the server accepts, excluding the terminator.
pub const MAX_REQUEST_LINE: usize = 256;

/// Separator between values of a row.
const VALUE_SEPARATOR: char = '\t';

// ============================================================================
// Response
// ============================================================================

/// A decoded server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Generated table.
    Table(RandomTable),
    /// `ERROR:` line; the session is still open.
    Error(String),
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a table, including the end-of-message marker.
#[must_use]
pub fn encode_table(table: &RandomTable) -> String {
    let mut out = String::with_capacity(table.value_count() * 8 + table.row_count() + 1);

    for row in table.rows() {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                out.push(VALUE_SEPARATOR);
            }
            // writing to a String cannot fail
            let _ = write!(out, "{value}");
        }
        out.push('\n');
    }
    out.push('\n');

    out
}

/// Encodes an error line.
#[must_use]
pub fn encode_error(reason: impl fmt::Display) -> String {
    format!("{ERROR_PREFIX}{reason}\n")
}

// ============================================================================
// Framed Reads
// ============================================================================

/// Outcome of [`read_line_bounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// A line (possibly unterminated at end of stream) was read.
    Line,
    /// End of stream before any byte.
    Eof,
    /// More than `limit` bytes without a newline.
    TooLong,
    /// A complete line was read but it is not UTF-8; `buf` is left empty.
    NotUtf8,
}

/// Reads one line of at most `limit` bytes (terminator excluded) into `buf`.
///
/// `buf` is cleared first. A line that is not UTF-8 is consumed and reported
/// as [`LineRead::NotUtf8`], so the caller can answer it and keep reading.
///
/// # Errors
///
/// [`Error::Io`] on read failure.
pub async fn read_line_bounded<R>(reader: &mut R, buf: &mut String, limit: usize) -> Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();

    let mut bytes = Vec::new();
    let n = (&mut *reader)
        .take((limit as u64).saturating_add(1))
        .read_until(b'\n', &mut bytes)
        .await?;

    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if bytes.last() != Some(&b'\n') && n > limit {
        return Ok(LineRead::TooLong);
    }

    match String::from_utf8(bytes) {
        Ok(line) => {
            *buf = line;
            Ok(LineRead::Line)
        }
        Err(_) => Ok(LineRead::NotUtf8),
    }
}

/// Reads one complete response.
///
/// Reads up to the empty-line marker for a table, or a single line for an
/// error. At most `max_bytes` are consumed.
///
/// # Errors
///
/// - [`Error::ConnectionClosed`] if the stream ends before the marker
/// - [`Error::Protocol`] if a row is not integers or the size cap is hit
/// - [`Error::Io`] on read failure
pub async fn read_response<R>(reader: &mut R, max_bytes: usize) -> Result<Response>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut rows: Vec<Vec<i64>> = Vec::new();
    let mut consumed = 0usize;

    loop {
        let remaining = max_bytes.saturating_sub(consumed);
        match read_line_bounded(reader, &mut line, remaining).await? {
            LineRead::Eof => return Err(Error::ConnectionClosed),
            LineRead::TooLong => {
                return Err(Error::protocol(format!(
                    "response exceeds {max_bytes} bytes"
                )));
            }
            LineRead::NotUtf8 => return Err(Error::protocol("response is not UTF-8")),
            LineRead::Line => {}
        }
        consumed += line.len();

        if !line.ends_with('\n') {
            // partial line followed by EOF
            return Err(Error::ConnectionClosed);
        }

        let content = line.trim_end_matches(['\r', '\n']);

        if rows.is_empty()
            && let Some(reason) = content.strip_prefix(ERROR_PREFIX)
        {
            return Ok(Response::Error(reason.trim().to_string()));
        }

        if content.is_empty() {
            if rows.is_empty() {
                return Err(Error::protocol("empty table"));
            }
            return Ok(Response::Table(RandomTable::from_rows(rows)));
        }

        rows.push(parse_row(content)?);
    }
}

fn parse_row(content: &str) -> Result<Vec<i64>> {
    content
        .split_whitespace()
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| Error::protocol(format!("unexpected token in table row: {token:?}")))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::BufReader;

    const LIMIT: usize = 1024 * 1024;

    #[test]
    fn test_encode_table() {
        let table = RandomTable::from_rows(vec![vec![3, 1, 2], vec![5, 4]]);
        assert_eq!(encode_table(&table), "3\t1\t2\n5\t4\n\n");
    }

    #[test]
    fn test_encode_error() {
        assert_eq!(encode_error("empty-range"), "ERROR: empty-range\n");
    }

    #[tokio::test]
    async fn test_read_table_response() {
        let mut reader = BufReader::new(&b"3\t1\t2\n5\t4\n\n"[..]);
        let response = read_response(&mut reader, LIMIT).await.expect("valid");
        assert_eq!(
            response,
            Response::Table(RandomTable::from_rows(vec![vec![3, 1, 2], vec![5, 4]]))
        );
    }

    #[tokio::test]
    async fn test_read_accepts_space_aligned_rows() {
        let mut reader = BufReader::new(&b" 10   2\r\n  7\r\n\r\n"[..]);
        let response = read_response(&mut reader, LIMIT).await.expect("valid");
        assert_eq!(
            response,
            Response::Table(RandomTable::from_rows(vec![vec![10, 2], vec![7]]))
        );
    }

    #[tokio::test]
    async fn test_read_error_response() {
        let mut reader = BufReader::new(&b"ERROR: non-numeric\n"[..]);
        let response = read_response(&mut reader, LIMIT).await.expect("valid");
        assert_eq!(response, Response::Error("non-numeric".into()));
    }

    #[tokio::test]
    async fn test_two_responses_back_to_back() {
        let mut reader = BufReader::new(&b"ERROR: empty-range\n1\t2\n\n"[..]);

        let first = read_response(&mut reader, LIMIT).await.expect("first");
        assert_eq!(first, Response::Error("empty-range".into()));

        let second = read_response(&mut reader, LIMIT).await.expect("second");
        assert_eq!(second, Response::Table(RandomTable::from_rows(vec![vec![1, 2]])));
    }

    #[tokio::test]
    async fn test_missing_marker_is_connection_closed() {
        let mut reader = BufReader::new(&b"1\t2\n3\t4\n"[..]);
        let err = read_response(&mut reader, LIMIT).await.expect_err("truncated");
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_partial_row_is_connection_closed() {
        let mut reader = BufReader::new(&b"1\t2\n3\t"[..]);
        let err = read_response(&mut reader, LIMIT).await.expect_err("truncated");
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_garbage_row_is_protocol_error() {
        let mut reader = BufReader::new(&b"1\tx\n\n"[..]);
        let err = read_response(&mut reader, LIMIT).await.expect_err("garbage");
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let mut reader = BufReader::new(&b"1\t2\t3\t4\t5\n6\t7\n\n"[..]);
        let err = read_response(&mut reader, 8).await.expect_err("too big");
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_read_line_bounded() {
        let mut reader = BufReader::new(&b"1,10,5\nlast"[..]);
        let mut buf = String::new();

        assert_eq!(read_line_bounded(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Line);
        assert_eq!(buf, "1,10,5\n");

        assert_eq!(read_line_bounded(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Line);
        assert_eq!(buf, "last");

        assert_eq!(read_line_bounded(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_read_line_bounded_too_long() {
        let mut reader = BufReader::new(&b"0123456789\n"[..]);
        let mut buf = String::new();
        assert_eq!(read_line_bounded(&mut reader, &mut buf, 4).await.unwrap(), LineRead::TooLong);
    }

    #[tokio::test]
    async fn test_read_line_bounded_not_utf8() {
        let mut reader = BufReader::new(&b"\xff,10,5\n1,4,2\n"[..]);
        let mut buf = String::new();

        assert_eq!(read_line_bounded(&mut reader, &mut buf, 16).await.unwrap(), LineRead::NotUtf8);
        assert!(buf.is_empty());

        // the bad line is consumed, the next one reads normally
        assert_eq!(read_line_bounded(&mut reader, &mut buf, 16).await.unwrap(), LineRead::Line);
        assert_eq!(buf, "1,4,2\n");
    }

    #[tokio::test]
    async fn test_read_line_bounded_unlimited() {
        let mut reader = BufReader::new(&b"1,10,5\n"[..]);
        let mut buf = String::new();

        let read = read_line_bounded(&mut reader, &mut buf, usize::MAX).await.unwrap();
        assert_eq!(read, LineRead::Line);
        assert_eq!(buf, "1,10,5\n");
    }

    #[tokio::test]
    async fn test_response_not_utf8_is_protocol_error() {
        let mut reader = BufReader::new(&b"1\t\xff\n\n"[..]);
        let err = read_response(&mut reader, usize::MAX).await.expect_err("not utf-8");
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
