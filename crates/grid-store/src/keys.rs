//! Partition and row key derivation.
//!
//! ```text
//! partition key:  "{projection_id}-{y}"
//! row key:        "{valid_time},{run_time}"   e.g. "2024-01-01T00:00:00Z,2023-12-31T18:00:00Z"
//! property name:  "f{field_id}"
//! ```
//!
//! Timestamps are rendered fixed-width in UTC, so string order of row
//! keys is chronological order of valid time. Range filters on valid
//! time become plain string comparisons on the row key.

use chrono::{DateTime, Utc};

use wx_common::time::{format_sortable, is_sortable, parse_iso8601, SORTABLE_YEARS};
use wx_common::{StoreError, StoreResult, TimeRange};
use wx_storage::RowKeyRange;

/// Partition holding every record for grid row `y` of a projection.
pub fn partition_key(projection_id: i32, y: usize) -> String {
    format!("{}-{}", projection_id, y)
}

/// Reject a time whose year falls outside [`SORTABLE_YEARS`]. Keys for
/// such times would not sort chronologically.
pub fn check_key_time(param: &str, t: &DateTime<Utc>) -> StoreResult<()> {
    if !is_sortable(t) {
        return Err(StoreError::invalid_argument(
            param,
            format!(
                "{} is outside years {}..={}",
                t,
                SORTABLE_YEARS.start(),
                SORTABLE_YEARS.end()
            ),
        ));
    }
    Ok(())
}

/// Row key for one (valid, run) time pair.
///
/// Both times must already be truncated to whole seconds and pass
/// [`check_key_time`]; the engines check before building keys.
pub fn row_key(valid_time: &DateTime<Utc>, run_time: &DateTime<Utc>) -> String {
    format!("{},{}", format_sortable(valid_time), format_sortable(run_time))
}

/// Split a row key back into its (valid, run) times.
pub fn parse_row_key(key: &str) -> StoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    let (valid, run) = key
        .split_once(',')
        .ok_or_else(|| StoreError::Decode(format!("row key '{}' has no run time", key)))?;

    let parse = |s: &str| {
        parse_iso8601(s).map_err(|e| StoreError::Decode(format!("row key '{}': {}", key, e)))
    };
    Ok((parse(valid)?, parse(run)?))
}

/// Property name holding the blob of one field.
pub fn field_column(field_id: i32) -> String {
    format!("f{}", field_id)
}

/// Row-key bounds selecting a window of valid times.
///
/// Both bounds are the bare valid time, so with the `,run` suffix on
/// stored keys a record at `start` sorts after the lower bound and is
/// kept, while a record at `end` sorts after the upper bound and is not.
pub fn fetch_range(window: &TimeRange) -> RowKeyRange {
    RowKeyRange::between(format_sortable(&window.start), format_sortable(&window.end))
}

/// Row-key bounds selecting every record strictly before `cutoff`.
pub fn retention_range(cutoff: &DateTime<Utc>) -> RowKeyRange {
    RowKeyRange::before(format_sortable(cutoff))
}
