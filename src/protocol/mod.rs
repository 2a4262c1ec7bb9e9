//! Line protocol spoken between client and server.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Format |
//! |---------|-----------|--------|
//! | Request | Client → Server | `<min>,<max>,<cols>\n` |
//! | Table | Server → Client | rows of `\t`-separated integers, each ending `\n`, then an empty line |
//! | Error | Server → Client | `ERROR: <reason>\n` |
//!
//! A table always has at least one row, so the empty line marks the end of
//! the message no matter how the bytes were split across reads.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | [`TableRequest`] and the request-line parser |
//! | `response` | Response encoding and framed reads |

// ============================================================================
// Submodules
// ============================================================================

/// Request type and parser.
pub mod request;

/// Response framing.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use request::TableRequest;
pub use response::{
    ERROR_PREFIX, LineRead, MAX_REQUEST_LINE, Response, encode_error, encode_table,
    read_line_bounded, read_response,
};

/// Default TCP port of the table server.
pub const DEFAULT_PORT: u16 = 3215;
