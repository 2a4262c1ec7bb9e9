//! Table client.
//!
//! A cycle turns one trigger into one printed table:
//!
//! ```text
//! trigger → parameters → request line → response → render
//! ```
//!
//! Parameters come from a [`ParameterSource`]. With
//! [`ParameterSource::Watched`] the store is read on every cycle, so a
//! change made between two cycles shows up in the second one without a
//! restart.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`TableClient`] and cycle types |
//! | `interactive` | Line-triggered loop over any async reader/writer |
//! | `options` | [`ClientOptions`] and [`ConfigPolicy`] |
//! | `render` | Grid and JSON output |

// ============================================================================
// Submodules
// ============================================================================

/// Client and cycle types.
pub mod core;

/// Line-triggered loop.
pub mod interactive;

/// Client options.
pub mod options;

/// Output rendering.
pub mod render;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{CycleReport, ParameterOrigin, ParameterSource, TableClient};
pub use interactive::{CycleStats, run_interactive};
pub use options::{ClientOptions, ConfigPolicy, SERVER_ENV, with_default_port};
pub use render::{OutputFormat, render, render_grid};
