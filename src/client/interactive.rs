//! Line-triggered client loop.
//!
//! Each line read from `input` triggers one cycle. The loop ends at end of
//! input or on `q`, `quit` or `exit`. Cycle failures are reported on
//! `output` and the loop carries on.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::Result;

use super::render::{OutputFormat, render};
use super::TableClient;

// ============================================================================
// CycleStats
// ============================================================================

/// Counts of finished cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles that printed a table.
    pub succeeded: u64,
    /// Cycles that printed an error.
    pub failed: u64,
}

// ============================================================================
// Loop
// ============================================================================

/// Runs cycles until `input` ends or the operator quits.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if `input` or `output` fails.
/// Cycle errors are written to `output`, not returned.
pub async fn run_interactive<R, W>(
    client: &mut TableClient,
    input: &mut R,
    output: &mut W,
    format: OutputFormat,
) -> Result<CycleStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = CycleStats::default();
    let mut line = String::new();

    loop {
        output.write_all(client.source().prompt().as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            debug!("Input closed");
            break;
        }

        if matches!(line.trim(), "q" | "quit" | "exit") {
            break;
        }

        match client.cycle(&line).await {
            Ok(report) => {
                stats.succeeded += 1;
                if report.is_stale() {
                    output
                        .write_all(b"(configuration unavailable, using last known good parameters)\n")
                        .await?;
                }
                output.write_all(render(&report, format)?.as_bytes()).await?;
            }
            Err(e) => {
                stats.failed += 1;
                info!(error = %e, "Cycle failed");
                output.write_all(format!("{}\n", e.report()).as_bytes()).await?;
            }
        }
        output.flush().await?;
    }

    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================
