//! Write path: full field grids into per-row partitions.
//!
//! One worker owns each grid row `y`. It slices row `y` out of every
//! submitted grid, encodes it, and upserts the resulting records into
//! partition `"{projection}-{y}"` only. No two workers of one call ever
//! write the same partition.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, debug_span, info, instrument};

use wx_common::time::truncate_to_second;
use wx_common::{FieldBatch, FieldGrid, StoreError, StoreResult};
use wx_storage::{Entity, TableClient};

use crate::codec::GridCodec;
use crate::keys::{check_key_time, field_column, partition_key, row_key};
use crate::provider::PutReport;
use crate::scheduler::try_fan_out;
use crate::store::GridStore;
use crate::telemetry::StoreMetrics;

/// One field message reduced to what a row worker needs.
struct Message {
    row_key: String,
    column: String,
    grid: FieldGrid,
}

#[derive(Clone)]
struct PutWorker {
    table: Arc<dyn TableClient>,
    codec: GridCodec,
    metrics: Arc<StoreMetrics>,
    messages: Arc<Vec<Message>>,
    projection_id: i32,
}

impl PutWorker {
    async fn run(self, y: usize) -> StoreResult<usize> {
        let partition = partition_key(self.projection_id, y);

        // Several fields at the same times share one record
        let mut records: BTreeMap<&str, Entity> = BTreeMap::new();
        for message in self.messages.iter() {
            let values = message.grid.row(y).ok_or_else(|| {
                StoreError::Internal(format!("grid has no row {} after validation", y))
            })?;
            let blob = self.codec.encode_row(values)?;

            records
                .entry(message.row_key.as_str())
                .or_insert_with(|| Entity::new(partition.as_str(), message.row_key.as_str()))
                .set(message.column.as_str(), Some(blob));
        }

        // The facade splits this into store-sized commits
        let entities: Vec<Entity> = records.into_values().collect();
        let written = self.table.upsert_batch(&partition, entities).await?;
        self.metrics.record_upserted(written);

        debug!(partition = %partition, records = written, "Row written");
        Ok(written)
    }
}

impl GridStore {
    #[instrument(parent = self.telemetry.span(), skip_all, fields(projection = projection_id, keys = batch.len()))]
    pub(crate) async fn store_fields(
        &self,
        projection_id: i32,
        batch: FieldBatch,
    ) -> StoreResult<PutReport> {
        let projection = self.catalog.get_projection(projection_id).await?;

        // Every grid is checked before anything is written
        for (key, grids) in &batch {
            check_key_time("valid_time", &key.valid_time)?;
            check_key_time("run_time", &key.run_time)?;
            if let Some(bad) = grids.iter().find(|g| !g.matches(&projection)) {
                return Err(StoreError::invalid_argument(
                    "grids",
                    format!(
                        "field {} at {} is {}x{}, projection {} is {}x{}",
                        key.field_id,
                        key.valid_time,
                        bad.width(),
                        bad.height(),
                        projection.id,
                        projection.n_x,
                        projection.n_y
                    ),
                ));
            }
        }

        // Last grid per key wins; keys without grids write nothing
        let mut keyed: Vec<_> = batch
            .into_iter()
            .filter_map(|(key, grids)| grids.into_iter().last().map(|grid| (key, grid)))
            .collect();
        keyed.sort_by_key(|(key, _)| (key.field_id, key.valid_time, key.run_time));

        let messages: Vec<Message> = keyed
            .into_iter()
            .map(|(key, grid)| Message {
                row_key: row_key(
                    &truncate_to_second(key.valid_time),
                    &truncate_to_second(key.run_time),
                ),
                column: field_column(key.field_id),
                grid,
            })
            .collect();

        if messages.is_empty() || projection.n_y == 0 {
            debug!("No field grids to write");
            return Ok(PutReport::default());
        }

        let message_count = messages.len();
        let worker = PutWorker {
            table: self.table.clone(),
            codec: self.codec,
            metrics: self.telemetry.shared_metrics(),
            messages: Arc::new(messages),
            projection_id: projection.id,
        };

        let limit = self.config.put_workers.unwrap_or(projection.n_y);
        let work = (0..projection.n_y).map(|y| {
            let span = debug_span!("put_row", y);
            (span, worker.clone().run(y))
        });

        let written = try_fan_out(work, limit).await?;
        let report = PutReport {
            partitions_written: written.iter().filter(|n| **n > 0).count(),
            records_upserted: written.iter().sum(),
        };

        info!(
            messages = message_count,
            partitions = report.partitions_written,
            records = report.records_upserted,
            "Stored field grids"
        );
        Ok(report)
    }
}
