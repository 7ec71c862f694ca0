//! Common test fixtures for wx-grid tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in gridded forecast storage.

/// Common projection shapes for testing.
pub mod projections {
    use wx_common::Projection;

    /// The 3x2 grid used by the basic write/read scenario.
    pub const SMALL: Projection = Projection {
        id: 1,
        n_x: 3,
        n_y: 2,
    };

    /// A square grid with enough rows to exercise worker fan-out.
    pub const MEDIUM: Projection = Projection {
        id: 2,
        n_x: 16,
        n_y: 24,
    };

    /// A single-cell grid.
    pub const POINT: Projection = Projection {
        id: 3,
        n_x: 1,
        n_y: 1,
    };
}

/// Common field identifiers for testing.
pub mod fields {
    use wx_common::FieldRef;

    /// Temperature at 2m above ground
    pub const TMP_2M: FieldRef = FieldRef {
        id: 7,
        metric_id: 1,
    };

    /// Wind speed at 10m above ground
    pub const WIND_10M: FieldRef = FieldRef {
        id: 8,
        metric_id: 2,
    };

    /// Mean sea level pressure
    pub const PRMSL: FieldRef = FieldRef {
        id: 9,
        metric_id: 3,
    };
}

/// Common time values for testing.
pub mod time {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// A fixed reference time for tests (2024-01-01T00:00:00Z)
    pub const REFERENCE_TIME: &str = "2024-01-01T00:00:00Z";

    /// [`REFERENCE_TIME`] as a timestamp.
    pub fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("reference time is unambiguous"))
    }

    /// The reference time shifted by whole hours.
    pub fn hours(offset: i64) -> DateTime<Utc> {
        reference() + Duration::hours(offset)
    }

    /// The reference time shifted by whole minutes.
    pub fn minutes(offset: i64) -> DateTime<Utc> {
        reference() + Duration::minutes(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_time_matches_constant() {
        assert_eq!(time::reference().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert!(time::hours(-1) < time::reference());
        assert_eq!(time::minutes(60), time::hours(1));
    }

    #[test]
    fn test_projection_fixtures_are_distinct() {
        assert_ne!(projections::SMALL.id, projections::MEDIUM.id);
        assert_ne!(projections::MEDIUM.id, projections::POINT.id);
        assert_eq!(projections::SMALL.n_x * projections::SMALL.n_y, 6);
    }

    #[test]
    fn test_field_fixtures_are_distinct() {
        assert_ne!(fields::TMP_2M.id, fields::WIND_10M.id);
        assert_ne!(fields::WIND_10M.id, fields::PRMSL.id);
    }
}
