//! Random table service - tables of unique random integers over TCP.
//!
//! A client asks for every integer of `[min, max]` in random order, laid out
//! in rows of `cols` values. The server answers over a line protocol and
//! keeps the session open for further requests.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   "min,max,cols\n"   ┌───────────────┐   permutation   ┌──────────────────┐
//! │  TableClient  │ ───────────────────► │  TableServer  │ ──────────────► │ RandomnessSource │
//! │  (triggered)  │ ◄─────────────────── │  → Session    │                 │ local | remote   │
//! └───────┬───────┘  rows + empty line   └───────────────┘                 └──────────────────┘
//!         │ every cycle
//! ┌───────▼───────┐
//! │ ConfigWatcher │  min / max / table-size from a key-value store
//! └───────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use random_table::client::{ClientOptions, ParameterSource, TableClient, render_grid};
//! use random_table::randomness::LocalRandomSource;
//! use random_table::transport::{ServerConfig, TableServer};
//! use random_table::{Result, TableRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ServerConfig::default().with_bind_addr("127.0.0.1:3215".parse().expect("addr"));
//!     let server = TableServer::bind(config, Arc::new(LocalRandomSource::new())).await?;
//!     tokio::spawn(server.run());
//!
//!     let request = TableRequest::new(1, 10, 5)?;
//!     let mut client = TableClient::new(
//!         ClientOptions::new("127.0.0.1"),
//!         ParameterSource::Fixed(request),
//!     )?;
//!
//!     let report = client.cycle("").await?;
//!     print!("{}", render_grid(&report.table));
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Trigger-driven client, options and rendering |
//! | [`config`] | Key-value stores and [`ConfigWatcher`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`protocol`] | Request parsing and response framing |
//! | [`randomness`] | [`RandomnessSource`] implementations |
//! | [`table`] | [`TableGenerator`] and [`RandomTable`] |
//! | [`transport`] | TCP server, sessions and client connection |

// ============================================================================
// Modules
// ============================================================================

/// Trigger-driven table client.
pub mod client;

/// Runtime parameters from an external key-value store.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Wire format: request lines and framed responses.
pub mod protocol;

/// Sources of random permutations.
pub mod randomness;

/// Table generation and layout.
pub mod table;

/// TCP server, sessions and client connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientOptions, ConfigPolicy, ParameterSource, TableClient};

// Config types
pub use config::{ClientConfig, ConfigStore, ConfigWatcher};

// Error types
pub use error::{Error, ErrorKind, Result, ValidationReason};

// Protocol types
pub use protocol::{Response, TableRequest};

// Randomness types
pub use randomness::{EntropyPolicy, RandomnessSource};

// Table types
pub use table::{RandomTable, TableGenerator};

// Transport types
pub use transport::{ServerConfig, SessionPolicy, TableServer};
