//! Table rendering for the terminal.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::table::RandomTable;

use super::CycleReport;

// ============================================================================
// OutputFormat
// ============================================================================

/// How a cycle's table is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Right-aligned columns.
    #[default]
    Grid,
    /// One JSON object per cycle.
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!("unknown output format: {other}"))),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Renders `table` as an aligned grid, one line per row.
///
/// Every cell is padded to the widest value so columns line up.
#[must_use]
pub fn render_grid(table: &RandomTable) -> String {
    let width = table
        .values()
        .map(|value| value.to_string().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for row in table.rows() {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{value:>width$}");
        }
        out.push('\n');
    }
    out
}

/// Renders a cycle report in `format`, newline-terminated.
///
/// # Errors
///
/// Returns [`Error::Json`] if JSON encoding fails.
pub fn render(report: &CycleReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Grid => Ok(render_grid(&report.table)),
        OutputFormat::Json => {
            let mut out = serde_json::to_string(report)?;
            out.push('\n');
            Ok(out)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
