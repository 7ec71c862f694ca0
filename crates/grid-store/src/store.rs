//! Grid store over a table client and catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use wx_common::{DataPoint, FieldBatch, GridCell, StoreResult, TimeRange};
use wx_storage::{Catalog, TableClient};

use crate::codec::GridCodec;
use crate::config::GridStoreConfig;
use crate::provider::{CleanReport, DataProvider, PutReport};
use crate::telemetry::Telemetry;

/// [`DataProvider`] storing one partition per projection grid row.
pub struct GridStore {
    pub(crate) table: Arc<dyn TableClient>,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) config: GridStoreConfig,
    pub(crate) codec: GridCodec,
    pub(crate) telemetry: Telemetry,
}

impl GridStore {
    /// Create a store, validating `config`.
    pub fn new(
        table: Arc<dyn TableClient>,
        catalog: Arc<dyn Catalog>,
        config: GridStoreConfig,
        telemetry: Telemetry,
    ) -> StoreResult<Self> {
        config.validate()?;

        Ok(Self {
            table,
            catalog,
            codec: GridCodec::new(config.compression_level),
            config,
            telemetry,
        })
    }

    pub fn config(&self) -> &GridStoreConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}

#[async_trait]
impl DataProvider for GridStore {
    async fn get_fields(
        &self,
        projection_id: i32,
        cell: GridCell,
        field_ids: &[i32],
        range: TimeRange,
    ) -> StoreResult<Vec<DataPoint>> {
        self.fetch_points(projection_id, cell, field_ids, range).await
    }

    async fn put_fields(&self, projection_id: i32, fields: FieldBatch) -> StoreResult<PutReport> {
        self.store_fields(projection_id, fields).await
    }

    async fn clean(&self, cutoff: DateTime<Utc>) -> StoreResult<CleanReport> {
        self.remove_before(cutoff).await
    }

    async fn merge(&self) -> StoreResult<()> {
        debug!(parent: self.telemetry.span(), table = %self.table.table_name(), "Merge requested; nothing to do");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_storage::{MemoryCatalog, MemoryTable};

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = GridStoreConfig {
            clean_workers: 0,
            ..GridStoreConfig::default()
        };
        let result = GridStore::new(
            Arc::new(MemoryTable::new("grid")),
            Arc::new(MemoryCatalog::new()),
            config,
            Telemetry::disabled(),
        );
        assert!(result.is_err());
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_engine_futures_are_send() {
        let store = GridStore::new(
            Arc::new(MemoryTable::new("grid")),
            Arc::new(MemoryCatalog::new()),
            GridStoreConfig::default(),
            Telemetry::disabled(),
        )
        .unwrap();
        let range = TimeRange::new(Utc::now(), Utc::now());

        // Never polled; this only has to type-check
        assert_send(store.remove_before(Utc::now()));
        assert_send(store.store_fields(1, FieldBatch::new()));
        assert_send(store.fetch_points(1, GridCell::new(0, 0), &[7], range));
    }

    #[tokio::test]
    async fn test_merge_is_a_noop() {
        let table = Arc::new(MemoryTable::new("grid"));
        let store = GridStore::new(
            table.clone(),
            Arc::new(MemoryCatalog::new()),
            GridStoreConfig::default(),
            Telemetry::disabled(),
        )
        .unwrap();

        store.merge().await.unwrap();
        assert!(table.is_empty().await);
        assert_eq!(store.telemetry().snapshot().range_queries, 0);
    }
}
