//! Retention cutoff selection.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use wx_common::time::parse_iso8601;

/// Hours of data kept when neither a cutoff nor a retention is given.
pub const DEFAULT_RETENTION_HOURS: u64 = 24;

/// Pick the cutoff: an explicit timestamp wins, otherwise `now` minus the
/// retention period.
pub fn resolve(
    now: DateTime<Utc>,
    retention_hours: Option<u64>,
    explicit: Option<&str>,
) -> Result<DateTime<Utc>> {
    if let Some(s) = explicit {
        return parse_iso8601(s).context("Invalid --cutoff");
    }

    let hours = retention_hours.unwrap_or(DEFAULT_RETENTION_HOURS);
    let hours = i64::try_from(hours).context("--retention-hours out of range")?;
    let retention = Duration::try_hours(hours).context("--retention-hours out of range")?;
    now.checked_sub_signed(retention)
        .context("--retention-hours reaches before the earliest representable time")
}
