//! Implementation of the `dwell export` command.
//!
//! Writes daily and hourly totals for an inclusive day range as CSV, either to
//! stdout or to a file.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use dwell_core::{parse_day_range, render_csv};
use dwell_db::Database;

/// Run the export command.
///
/// Days without data are skipped; an empty range still produces the header.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    start: &str,
    end: &str,
    output: Option<&Path>,
) -> Result<()> {
    let (start, end) = parse_day_range(start, end)?;
    let stats = db
        .read_range(start, end)
        .context("failed to read statistics")?;
    let csv = render_csv(&stats);

    match output {
        Some(path) => {
            fs::write(path, &csv)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), days = stats.len(), "exported statistics");
            writeln!(writer, "Exported {} day(s) to {}", stats.len(), path.display())?;
        }
        None => {
            // Handle broken pipe gracefully (e.g., when piped to `head`)
            if writer.write_all(csv.as_bytes()).is_err() {
                tracing::debug!("output closed early");
            }
        }
    }

    Ok(())
}
