//! Table wrappers and store builders shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use grid_store::{GridStore, GridStoreConfig, Telemetry};
use test_utils::{fields, projections};
use wx_common::{StoreError, StoreResult};
use wx_storage::{Entity, MemoryCatalog, MemoryTable, RowKeyRange, Selection, TableClient};

/// Catalog holding every fixture projection and field.
pub fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_projection(projections::SMALL)
        .with_projection(projections::MEDIUM)
        .with_projection(projections::POINT)
        .with_field(fields::TMP_2M)
        .with_field(fields::WIND_10M)
        .with_field(fields::PRMSL)
}

pub fn store_over(table: Arc<dyn TableClient>, config: GridStoreConfig) -> GridStore {
    GridStore::new(table, Arc::new(catalog()), config, Telemetry::disabled()).unwrap()
}

/// An upsert or delete commit seen by [`RecordingTable`].
#[derive(Debug, Clone)]
pub struct Commit {
    pub partition_key: String,
    pub entity_partitions: Vec<String>,
    pub size: usize,
}

/// Passes everything through to a memory table and records commits.
pub struct RecordingTable {
    pub inner: MemoryTable,
    pub upserts: Mutex<Vec<Commit>>,
    pub deletes: Mutex<Vec<Commit>>,
    pub queries: Mutex<Vec<(String, RowKeyRange)>>,
}

impl RecordingTable {
    pub fn new(inner: MemoryTable) -> Self {
        Self {
            inner,
            upserts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn upserts(&self) -> Vec<Commit> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<Commit> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<(String, RowKeyRange)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableClient for RecordingTable {
    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn query_range(
        &self,
        partition_key: &str,
        range: &RowKeyRange,
        selection: &Selection,
    ) -> StoreResult<Vec<Entity>> {
        self.queries
            .lock()
            .unwrap()
            .push((partition_key.to_string(), range.clone()));
        self.inner.query_range(partition_key, range, selection).await
    }

    async fn commit_upserts(&self, partition_key: &str, entities: Vec<Entity>) -> StoreResult<()> {
        self.upserts.lock().unwrap().push(Commit {
            partition_key: partition_key.to_string(),
            entity_partitions: entities.iter().map(|e| e.partition_key.clone()).collect(),
            size: entities.len(),
        });
        self.inner.commit_upserts(partition_key, entities).await
    }

    async fn commit_deletes(&self, partition_key: &str, row_keys: Vec<String>) -> StoreResult<()> {
        self.deletes.lock().unwrap().push(Commit {
            partition_key: partition_key.to_string(),
            entity_partitions: Vec::new(),
            size: row_keys.len(),
        });
        self.inner.commit_deletes(partition_key, row_keys).await
    }
}

/// Which operations a [`FailingTable`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Query,
    Upsert,
    Delete,
}

/// Memory table that starts failing one kind of operation, either on one
/// partition or after a number of successful calls.
pub struct FailingTable {
    pub inner: MemoryTable,
    fail_on: FailOn,
    partition: Option<String>,
    succeed_first: usize,
    calls: AtomicUsize,
}

impl FailingTable {
    /// Fail every `fail_on` call against `partition`.
    pub fn on_partition(inner: MemoryTable, fail_on: FailOn, partition: &str) -> Self {
        Self {
            inner,
            fail_on,
            partition: Some(partition.to_string()),
            succeed_first: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Let the first `n` `fail_on` calls through, then fail the rest.
    pub fn after(inner: MemoryTable, fail_on: FailOn, n: usize) -> Self {
        Self {
            inner,
            fail_on,
            partition: None,
            succeed_first: n,
            calls: AtomicUsize::new(0),
        }
    }

    fn check(&self, op: FailOn, partition_key: &str) -> StoreResult<()> {
        if op != self.fail_on {
            return Ok(());
        }
        if let Some(target) = &self.partition {
            if target == partition_key {
                return Err(StoreError::Transient(format!("injected failure on {}", target)));
            }
            return Ok(());
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.succeed_first {
            return Err(StoreError::Transient(format!("injected failure on call {}", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl TableClient for FailingTable {
    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn query_range(
        &self,
        partition_key: &str,
        range: &RowKeyRange,
        selection: &Selection,
    ) -> StoreResult<Vec<Entity>> {
        self.check(FailOn::Query, partition_key)?;
        self.inner.query_range(partition_key, range, selection).await
    }

    async fn commit_upserts(&self, partition_key: &str, entities: Vec<Entity>) -> StoreResult<()> {
        self.check(FailOn::Upsert, partition_key)?;
        self.inner.commit_upserts(partition_key, entities).await
    }

    async fn commit_deletes(&self, partition_key: &str, row_keys: Vec<String>) -> StoreResult<()> {
        self.check(FailOn::Delete, partition_key)?;
        self.inner.commit_deletes(partition_key, row_keys).await
    }
}
