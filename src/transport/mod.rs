//! TCP transport for the table protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌──────────────────┐
//! │  TableClient     │        request line          │  TableServer     │
//! │                  │ ───────────────────────────► │   accept loop    │
//! │  TableConnection │                              │   → Session      │
//! │                  │ ◄─────────────────────────── │   (one per conn) │
//! └──────────────────┘   table rows + empty line    └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Client-side connection and exchange |
//! | `server` | Listener, session limit and accept loop |
//! | `session` | Per-connection state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Client-side connection.
pub mod connection;

/// Listener and accept loop.
pub mod server;

/// Per-connection state machine.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::TableConnection;
pub use server::{DEFAULT_MAX_SESSIONS, ServerConfig, TableServer};
pub use session::{CloseReason, Session, SessionPolicy, SessionState, SessionSummary};
