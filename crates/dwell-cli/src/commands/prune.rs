//! Retention pruning from the command line.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{Local, NaiveDate};

use dwell_db::Database;

/// Deletes statistics older than `days` (or the configured retention).
pub fn run<W: Write>(writer: &mut W, db: &mut Database, days: Option<u32>) -> Result<()> {
    prune_at(writer, db, days, Local::now().date_naive())
}

fn prune_at<W: Write>(
    writer: &mut W,
    db: &mut Database,
    days: Option<u32>,
    today: NaiveDate,
) -> Result<()> {
    let days = match days {
        Some(days) => days,
        None => db.load_settings()?.retention_days,
    };
    if days == 0 {
        bail!("retention must be at least 1 day");
    }

    let removed = db.prune(days, today)?;
    if removed == 0 {
        writeln!(writer, "Nothing older than {days} days.")?;
    } else {
        writeln!(writer, "Removed {removed} day(s) older than {days} days.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use dwell_core::{ResourceKey, Settings};

    fn seed(db: &mut Database, day: u32) {
        let naive = NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let at = Local.from_local_datetime(&naive).earliest().unwrap();
        db.record(&ResourceKey::new("example.com").unwrap(), 60, at)
            .unwrap();
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }

    #[test]
    fn prune_uses_configured_retention() {
        let mut db = Database::open_in_memory().unwrap();
        let mut settings = Settings::default();
        settings.set_retention(7).unwrap();
        db.save_settings(&settings).unwrap();
        for day in [1, 10, 23, 24, 30] {
            seed(&mut db, day);
        }

        let mut output = Vec::new();
        prune_at(&mut output, &mut db, None, today()).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Removed 3 day(s) older than 7 days.\n"
        );
        assert_eq!(db.summary().unwrap().days, 2);
    }

    #[test]
    fn prune_with_explicit_days_and_nothing_to_remove() {
        let mut db = Database::open_in_memory().unwrap();
        seed(&mut db, 30);

        let mut output = Vec::new();
        prune_at(&mut output, &mut db, Some(5), today()).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "Nothing older than 5 days.\n");
        assert_eq!(db.summary().unwrap().days, 1);
    }

    #[test]
    fn prune_rejects_zero_days() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        assert!(prune_at(&mut output, &mut db, Some(0), today()).is_err());
    }
}
