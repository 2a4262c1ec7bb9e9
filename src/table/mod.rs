//! Random table model and generator.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RandomTable`] | Rows of unique integers |
//! | [`TableGenerator`] | Draws a permutation and lays it out row-major |

// ============================================================================
// Submodules
// ============================================================================

/// Table generation.
pub mod generator;

/// Table value type.
pub mod grid;

// ============================================================================
// Re-exports
// ============================================================================

pub use generator::TableGenerator;
pub use grid::RandomTable;
