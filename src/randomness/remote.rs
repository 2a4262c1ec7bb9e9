//! Remote HTTP entropy service.
//!
//! Speaks the random.org "sequences" API shape:
//!
//! ```text
//! GET <endpoint>?min=<min>&max=<max>&col=1&format=plain&rnd=new
//! ```
//!
//! and expects one integer per line in the body. The request is sent as
//! HTTP/1.0 with `Connection: close` and the body is read to EOF. A
//! `Content-Length` header bounds the body, and a chunked body from a server
//! that sends one anyway is decoded.
//!
//! Only `http://` endpoints are dialed. TLS to a public service is the job of
//! an egress proxy in front of this process.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::{Position, Url};

use crate::error::{Error, Result};

use super::RandomnessSource;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for one fetch.
pub const DEFAULT_ENTROPY_TIMEOUT: Duration = Duration::from_secs(5);

/// Allowance for status line and headers.
const HEADER_ALLOWANCE: u64 = 16 * 1024;

/// Widest decimal `i64` plus a line terminator.
const MAX_BYTES_PER_VALUE: u64 = 22;

// ============================================================================
// RemoteEntropySource
// ============================================================================

/// Fetches permutations from an HTTP sequence generator.
#[derive(Debug, Clone)]
pub struct RemoteEntropySource {
    endpoint: Url,
    timeout: Duration,
}

impl RemoteEntropySource {
    /// Creates a source for `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `endpoint` does not parse
    /// - [`Error::Config`] if it is not an `http://` URL with a host
    pub fn new(endpoint: &str, fetch_timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;

        if endpoint.scheme() != "http" {
            return Err(Error::config(format!(
                "entropy endpoint must be http:// (got {}://); terminate TLS in an egress proxy",
                endpoint.scheme()
            )));
        }
        if endpoint.host_str().is_none() {
            return Err(Error::config("entropy endpoint has no host"));
        }

        Ok(Self {
            endpoint,
            timeout: fetch_timeout,
        })
    }

    /// The configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the request URL for a range.
    fn request_url(&self, min: i64, max: i64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("min", &min.to_string())
            .append_pair("max", &max.to_string())
            .append_pair("col", "1")
            .append_pair("format", "plain")
            .append_pair("rnd", "new");
        url
    }

    /// Performs the HTTP exchange and returns the raw response.
    async fn fetch(&self, url: &Url, max_bytes: u64) -> Result<Vec<u8>> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::config("entropy endpoint has no host"))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let mut stream = TcpStream::connect((host, port)).await?;

        let request = format!(
            "GET {target} HTTP/1.0\r\nHost: {host}\r\nUser-Agent: random-table/{version}\r\n\
             Accept: text/plain\r\nConnection: close\r\n\r\n",
            target = &url[Position::BeforePath..],
            version = env!("CARGO_PKG_VERSION"),
        );
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        (&mut stream).take(max_bytes + 1).read_to_end(&mut raw).await?;
        if raw.len() as u64 > max_bytes {
            return Err(Error::generation(format!(
                "entropy response exceeds {max_bytes} bytes"
            )));
        }

        Ok(raw)
    }
}

#[async_trait]
impl RandomnessSource for RemoteEntropySource {
    async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        if min > max {
            return Err(Error::generation(format!("empty range {min}..={max}")));
        }

        let url = self.request_url(min, max);
        let expected = u64::try_from(i128::from(max) - i128::from(min) + 1).unwrap_or(u64::MAX);
        let max_bytes = expected
            .saturating_mul(MAX_BYTES_PER_VALUE)
            .saturating_add(HEADER_ALLOWANCE);

        debug!(%url, "Fetching remote permutation");

        let raw = match timeout(self.timeout, self.fetch(&url, max_bytes)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e @ Error::Generation { .. })) => return Err(e),
            Ok(Err(e)) => {
                warn!(error = %e, "Entropy service request failed");
                return Err(Error::generation(format!("entropy service request failed: {e}")));
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Entropy service timed out");
                return Err(Error::generation(format!(
                    "entropy service timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        let body = parse_http_body(&raw)?;
        parse_permutation(&body, min, max)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Checks the status line and returns the decoded body.
fn parse_http_body(raw: &[u8]) -> Result<Cow<'_, str>> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::generation("entropy response is not UTF-8"))?;

    let (head, body) = text
        .split_once("\r\n\r\n")
        .or_else(|| text.split_once("\n\n"))
        .ok_or_else(|| Error::generation("entropy response has no header terminator"))?;

    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| Error::generation(format!("malformed status line: {status_line:?}")))?;

    if status != 200 {
        let detail = body.lines().next().unwrap_or_default().trim();
        return Err(Error::generation(format!(
            "entropy service returned {status}: {detail}"
        )));
    }

    let mut chunked = false;
    let mut content_length = None;
    for header in lines {
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("transfer-encoding") {
            chunked = value
                .split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        } else if name.trim().eq_ignore_ascii_case("content-length") {
            let len = value
                .parse::<usize>()
                .map_err(|_| Error::generation(format!("malformed Content-Length: {value:?}")))?;
            content_length = Some(len);
        }
    }

    // Transfer-Encoding wins over Content-Length (RFC 9112 6.3)
    if chunked {
        return decode_chunked(body).map(Cow::Owned);
    }

    match content_length {
        Some(len) => body
            .get(..len)
            .map(Cow::Borrowed)
            .ok_or_else(|| {
                Error::generation(format!(
                    "entropy response body is {} bytes, Content-Length says {len}",
                    body.len()
                ))
            }),
        None => Ok(Cow::Borrowed(body)),
    }
}

/// Joins the data of a chunked body. Trailers after the last chunk are ignored.
fn decode_chunked(mut rest: &str) -> Result<String> {
    let mut out = String::new();

    loop {
        let (size_line, after) = rest
            .split_once('\n')
            .ok_or_else(|| Error::generation("chunked body ends before the last chunk"))?;

        // chunk extensions follow a ';'
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| Error::generation(format!("malformed chunk size: {size_hex:?}")))?;

        if size == 0 {
            return Ok(out);
        }

        let data = after
            .get(..size)
            .ok_or_else(|| Error::generation("chunk is shorter than its declared size"))?;
        out.push_str(data);

        rest = after[size..]
            .strip_prefix("\r\n")
            .or_else(|| after[size..].strip_prefix('\n'))
            .ok_or_else(|| Error::generation("chunk is not followed by a line break"))?;
    }
}

/// Parses the body and checks it is exactly `[min, max]`, each once.
fn parse_permutation(body: &str, min: i64, max: i64) -> Result<Vec<i64>> {
    let len = usize::try_from(i128::from(max) - i128::from(min) + 1)
        .map_err(|_| Error::generation("range does not fit in memory"))?;

    let mut seen = vec![false; len];
    let mut values = Vec::with_capacity(len);

    for token in body.split_whitespace() {
        let value: i64 = token
            .parse()
            .map_err(|_| Error::generation(format!("unexpected token from entropy service: {token:?}")))?;

        if !(min..=max).contains(&value) {
            return Err(Error::generation(format!(
                "entropy service returned {value}, outside {min}..={max}"
            )));
        }
        let offset = usize::try_from(i128::from(value) - i128::from(min))
            .map_err(|_| Error::generation("offset overflow"))?;
        if std::mem::replace(&mut seen[offset], true) {
            return Err(Error::generation(format!(
                "entropy service returned {value} twice"
            )));
        }
        values.push(value);
    }

    if values.len() != len {
        return Err(Error::generation(format!(
            "entropy service returned {} of {len} values",
            values.len()
        )));
    }

    Ok(values)
}

// ============================================================================
// Tests
// ============================================================================
