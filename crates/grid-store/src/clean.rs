//! Retention: delete records whose valid time is before a cutoff.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, debug_span, info, instrument, warn};

use wx_common::time::truncate_to_second;
use wx_common::StoreResult;
use wx_storage::{RowKeyRange, Selection, TableClient};

use crate::keys::{check_key_time, partition_key, retention_range};
use crate::provider::{CleanReport, PartitionFailure};
use crate::scheduler::fan_out_all;
use crate::store::GridStore;
use crate::telemetry::StoreMetrics;

#[derive(Clone)]
struct CleanWorker {
    table: Arc<dyn TableClient>,
    metrics: Arc<StoreMetrics>,
    range: Arc<RowKeyRange>,
    batch_size: usize,
}

impl CleanWorker {
    /// Delete expired records of one partition. Chunks already deleted
    /// stay deleted if a later chunk fails.
    async fn run(self, partition: String) -> StoreResult<usize> {
        let expired = self
            .table
            .query_range(&partition, &self.range, &Selection::KeysOnly)
            .await?;
        self.metrics.record_range_query(expired.len());

        if expired.is_empty() {
            return Ok(0);
        }

        let row_keys: Vec<String> = expired.into_iter().map(|e| e.row_key).collect();
        let mut deleted = 0;
        for chunk in row_keys.chunks(self.batch_size) {
            let n = self.table.delete_batch(&partition, chunk.to_vec()).await?;
            self.metrics.record_deleted(n);
            deleted += n;
        }

        debug!(partition = %partition, deleted, "Partition cleaned");
        Ok(deleted)
    }
}

impl GridStore {
    #[instrument(parent = self.telemetry.span(), skip_all, fields(cutoff = %cutoff))]
    pub(crate) async fn remove_before(&self, cutoff: DateTime<Utc>) -> StoreResult<CleanReport> {
        let cutoff = truncate_to_second(cutoff);
        check_key_time("cutoff", &cutoff)?;
        let projections = self.catalog.list_projections().await?;

        let worker = CleanWorker {
            table: self.table.clone(),
            metrics: self.telemetry.shared_metrics(),
            range: Arc::new(retention_range(&cutoff)),
            batch_size: self.config.delete_batch_size,
        };

        // One limit across every projection's rows
        let partitions: Vec<String> = projections
            .iter()
            .flat_map(|p| (0..p.n_y).map(move |y| partition_key(p.id, y)))
            .collect();
        let work = partitions.into_iter().map(|partition| {
            let span = debug_span!("clean_partition", partition = %partition);
            (partition.clone(), span, worker.clone().run(partition))
        });

        let mut report = CleanReport {
            projections: projections.len(),
            ..CleanReport::default()
        };
        for (partition, outcome) in fan_out_all(work, self.config.clean_workers).await {
            match outcome {
                Ok(deleted) => {
                    report.partitions_scanned += 1;
                    report.records_deleted += deleted;
                }
                Err(error) => {
                    warn!(partition = %partition, error = %error, "Partition clean failed");
                    self.telemetry.metrics().record_worker_failure();
                    report.failures.push(PartitionFailure {
                        partition_key: partition,
                        error,
                    });
                }
            }
        }

        info!(
            projections = report.projections,
            partitions = report.partitions_scanned,
            deleted = report.records_deleted,
            failures = report.failures.len(),
            "Retention pass complete"
        );
        Ok(report)
    }
}
