//! Deleting all statistics.

use std::io::Write;

use anyhow::{Result, bail};

use dwell_db::Database;

/// Deletes all statistics once the caller has confirmed with `--yes`.
pub fn run<W: Write>(writer: &mut W, db: &mut Database, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("refusing to delete all statistics without --yes");
    }
    db.clear_all()?;
    writeln!(writer, "All statistics deleted. Settings were kept.")?;
    Ok(())
}
