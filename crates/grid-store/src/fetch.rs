//! Read path: point time series for one grid cell.
//!
//! The requested time range is cut into sub-windows and each sub-window
//! becomes one range query against the cell's row partition. Windows
//! share no row keys, so workers never see the same record twice.

use std::sync::Arc;
use tracing::{debug, debug_span, info, instrument, warn};

use wx_common::{DataPoint, FieldRef, GridCell, StoreError, StoreResult, TimeRange};
use wx_storage::{Selection, TableClient};

use crate::codec::GridCodec;
use crate::keys::{check_key_time, fetch_range, field_column, parse_row_key, partition_key};
use crate::scheduler::try_fan_out;
use crate::store::GridStore;
use crate::telemetry::StoreMetrics;

/// Everything one sub-window query needs, owned so it can be spawned.
#[derive(Clone)]
struct FetchWorker {
    table: Arc<dyn TableClient>,
    codec: GridCodec,
    metrics: Arc<StoreMetrics>,
    partition: Arc<str>,
    selection: Arc<Selection>,
    /// Requested fields with their property names
    columns: Arc<[(FieldRef, String)]>,
    x: usize,
}

impl FetchWorker {
    async fn run(self, window: TimeRange) -> StoreResult<Vec<DataPoint>> {
        let rows = self
            .table
            .query_range(&self.partition, &fetch_range(&window), &self.selection)
            .await?;
        self.metrics.record_range_query(rows.len());

        let mut points = Vec::new();
        for row in &rows {
            let (valid_time, run_time) = match parse_row_key(&row.row_key) {
                Ok(times) => times,
                Err(e) => {
                    warn!(row_key = %row.row_key, error = %e, "Skipping record with malformed row key");
                    self.metrics.record_decode_failure();
                    continue;
                }
            };

            for (field, column) in self.columns.iter() {
                // Missing or null property: this field was not written here
                let Some(blob) = row.get(column) else {
                    continue;
                };

                match self.codec.decode_column(blob, self.x) {
                    Ok(value) => points.push(DataPoint {
                        field_id: field.id,
                        metric_id: field.metric_id,
                        valid_time,
                        run_time,
                        value,
                    }),
                    Err(e) => {
                        warn!(
                            row_key = %row.row_key,
                            field = field.id,
                            error = %e,
                            "Skipping undecodable field"
                        );
                        self.metrics.record_decode_failure();
                    }
                }
            }
        }

        debug!(rows = rows.len(), points = points.len(), "Window fetched");
        Ok(points)
    }
}

impl GridStore {
    #[instrument(
        parent = self.telemetry.span(),
        skip_all,
        fields(projection = projection_id, x = cell.x, y = cell.y, start = %range.start, end = %range.end)
    )]
    pub(crate) async fn fetch_points(
        &self,
        projection_id: i32,
        cell: GridCell,
        field_ids: &[i32],
        range: TimeRange,
    ) -> StoreResult<Vec<DataPoint>> {
        if field_ids.is_empty() {
            return Err(StoreError::invalid_argument(
                "fields",
                "at least one field is required",
            ));
        }

        check_key_time("start", &range.start)?;
        check_key_time("end", &range.end)?;

        // Fields form a set; a repeated id would repeat every point
        let mut unique_ids: Vec<i32> = Vec::with_capacity(field_ids.len());
        for id in field_ids {
            if !unique_ids.contains(id) {
                unique_ids.push(*id);
            }
        }

        let projection = self.catalog.get_projection(projection_id).await?;
        projection.check_cell(cell)?;
        let fields = self.catalog.get_fields(&unique_ids).await?;

        let windows = range.truncated().windows(self.config.fetch_window());
        if windows.is_empty() {
            debug!("Empty time range, nothing to fetch");
            return Ok(Vec::new());
        }

        let columns: Vec<(FieldRef, String)> = fields
            .iter()
            .map(|field| (*field, field_column(field.id)))
            .collect();
        let worker = FetchWorker {
            table: self.table.clone(),
            codec: self.codec,
            metrics: self.telemetry.shared_metrics(),
            partition: Arc::from(partition_key(projection.id, cell.y)),
            selection: Arc::new(Selection::Columns(
                columns.iter().map(|(_, column)| column.clone()).collect(),
            )),
            columns: Arc::from(columns),
            x: cell.x,
        };

        let window_count = windows.len();
        let limit = self.config.fetch_workers.unwrap_or(window_count);
        let work = windows.into_iter().map(|window| {
            let span = debug_span!("fetch_window", start = %window.start, end = %window.end);
            (span, worker.clone().run(window))
        });

        let points: Vec<DataPoint> = try_fan_out(work, limit)
            .await?
            .into_iter()
            .flatten()
            .collect();
        self.telemetry.metrics().record_points(points.len());

        info!(windows = window_count, points = points.len(), "Fetched data points");
        Ok(points)
    }
}
