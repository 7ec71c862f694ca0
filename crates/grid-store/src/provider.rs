//! The storage contract exposed to ingestion and serving layers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use wx_common::{DataPoint, FieldBatch, GridCell, StoreError, StoreResult, TimeRange};

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PutReport {
    /// Partitions that received at least one record.
    pub partitions_written: usize,
    /// Records created or merged, summed over partitions.
    pub records_upserted: usize,
}

/// A partition the retention engine could not finish.
#[derive(Debug, Serialize)]
pub struct PartitionFailure {
    pub partition_key: String,
    #[serde(serialize_with = "error_message")]
    pub error: StoreError,
}

fn error_message<S: Serializer>(error: &StoreError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of a retention pass.
#[derive(Debug, Default, Serialize)]
pub struct CleanReport {
    /// Projections visited.
    pub projections: usize,
    /// Partitions whose scan completed.
    pub partitions_scanned: usize,
    /// Records deleted across all partitions.
    pub records_deleted: usize,
    /// Partitions that failed, in completion order.
    pub failures: Vec<PartitionFailure>,
}

impl CleanReport {
    /// True when every partition was processed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read, write and retention access to gridded forecast fields.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Values of `field_ids` at one grid cell for valid times in `range`.
    ///
    /// Records whose valid time equals `range.start` are returned and
    /// records at `range.end` are not. The result is not sorted.
    async fn get_fields(
        &self,
        projection_id: i32,
        cell: GridCell,
        field_ids: &[i32],
        range: TimeRange,
    ) -> StoreResult<Vec<DataPoint>>;

    /// Store full field grids for one projection.
    ///
    /// Where a key carries several grids only the last one is kept.
    async fn put_fields(&self, projection_id: i32, fields: FieldBatch) -> StoreResult<PutReport>;

    /// Delete every record whose valid time is before `cutoff`.
    async fn clean(&self, cutoff: DateTime<Utc>) -> StoreResult<CleanReport>;

    /// Consolidation hook. Does nothing yet.
    async fn merge(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report_completeness() {
        let mut report = CleanReport::default();
        assert!(report.is_complete());

        report.failures.push(PartitionFailure {
            partition_key: "1-0".to_string(),
            error: StoreError::Transient("timeout".into()),
        });
        assert!(!report.is_complete());
    }

    #[test]
    fn test_clean_report_serializes_error_text() {
        let report = CleanReport {
            projections: 1,
            partitions_scanned: 1,
            records_deleted: 4,
            failures: vec![PartitionFailure {
                partition_key: "1-1".to_string(),
                error: StoreError::Transient("timeout".into()),
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["records_deleted"], 4);
        assert_eq!(json["failures"][0]["partition_key"], "1-1");
        assert_eq!(
            json["failures"][0]["error"],
            "Table store unavailable: timeout"
        );
    }
}
