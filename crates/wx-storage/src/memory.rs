//! In-memory table backend.
//!
//! Keeps partitions and rows in ordered maps so range queries return
//! rows in row-key order, matching what a real partitioned store does.
//! Used by the test suites and for embedded, single-process use.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;
use tracing::debug;

use wx_common::StoreResult;

use crate::table::{ensure_batch_fits, Entity, RowKeyRange, Selection, TableClient};

/// Default per-commit entity limit, matching common cloud table stores.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

type Properties = BTreeMap<String, Option<Bytes>>;
type Partition = BTreeMap<String, Properties>;

/// Ordered in-memory table.
pub struct MemoryTable {
    name: String,
    max_batch_size: usize,
    partitions: RwLock<BTreeMap<String, Partition>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            partitions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Override the per-commit entity limit.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Total number of stored entities.
    pub async fn len(&self) -> usize {
        self.partitions.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys of all non-empty partitions.
    pub async fn partition_keys(&self) -> Vec<String> {
        self.partitions.read().await.keys().cloned().collect()
    }

    /// Point lookup of a single entity.
    pub async fn get(&self, partition_key: &str, row_key: &str) -> Option<Entity> {
        let partitions = self.partitions.read().await;
        let properties = partitions.get(partition_key)?.get(row_key)?;
        Some(Entity {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
            properties: properties.clone(),
        })
    }
}

#[async_trait]
impl TableClient for MemoryTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn query_range(
        &self,
        partition_key: &str,
        range: &RowKeyRange,
        selection: &Selection,
    ) -> StoreResult<Vec<Entity>> {
        // BTreeMap::range panics on inverted or empty exclusive bounds
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let partitions = self.partitions.read().await;
        let Some(partition) = partitions.get(partition_key) else {
            return Ok(Vec::new());
        };

        let lower = range
            .after
            .as_deref()
            .map_or(Bound::Unbounded, Bound::Excluded);
        let upper = range
            .before
            .as_deref()
            .map_or(Bound::Unbounded, Bound::Excluded);

        let entities = partition
            .range::<str, _>((lower, upper))
            .map(|(row_key, properties)| Entity {
                partition_key: partition_key.to_string(),
                row_key: row_key.clone(),
                properties: properties
                    .iter()
                    .filter(|(name, _)| selection.includes(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            })
            .collect();

        Ok(entities)
    }

    async fn commit_upserts(
        &self,
        partition_key: &str,
        entities: Vec<Entity>,
    ) -> StoreResult<()> {
        ensure_batch_fits(entities.len(), self.max_batch_size)?;

        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(partition_key.to_string()).or_default();
        let count = entities.len();
        for entity in entities {
            partition
                .entry(entity.row_key)
                .or_default()
                .extend(entity.properties);
        }

        debug!(table = %self.name, partition = %partition_key, count, "Merged entities");
        Ok(())
    }

    async fn commit_deletes(
        &self,
        partition_key: &str,
        row_keys: Vec<String>,
    ) -> StoreResult<()> {
        ensure_batch_fits(row_keys.len(), self.max_batch_size)?;

        let mut partitions = self.partitions.write().await;
        if let Some(partition) = partitions.get_mut(partition_key) {
            for row_key in &row_keys {
                partition.remove(row_key);
            }
            if partition.is_empty() {
                partitions.remove(partition_key);
            }
        }

        debug!(table = %self.name, partition = %partition_key, count = row_keys.len(), "Deleted entities");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_common::StoreError;

    fn blob(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[tokio::test]
    async fn test_upsert_merges_properties() {
        let table = MemoryTable::new("grid");

        table
            .insert_or_merge(Entity::new("1-0", "a").with_property("f1", blob("one")))
            .await
            .unwrap();
        table
            .insert_or_merge(
                Entity::new("1-0", "a")
                    .with_property("f2", blob("two"))
                    .with_property("f1", blob("uno")),
            )
            .await
            .unwrap();

        let entity = table.get("1-0", "a").await.unwrap();
        assert_eq!(entity.get("f1"), Some(&blob("uno")));
        assert_eq!(entity.get("f2"), Some(&blob("two")));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_query_range_is_ordered_and_strict() {
        let table = MemoryTable::new("grid");
        let entities = ["d", "a", "c", "b", "e"]
            .iter()
            .map(|k| Entity::new("p", *k).with_property("v", blob("x")))
            .collect();
        table.upsert_batch("p", entities).await.unwrap();

        let rows = table
            .query_range("p", &RowKeyRange::between("a", "e"), &Selection::All)
            .await
            .unwrap();
        let keys: Vec<_> = rows.iter().map(|e| e.row_key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "d"]);

        let rows = table
            .query_range("p", &RowKeyRange::before("c"), &Selection::KeysOnly)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|e| e.properties.is_empty()));
    }

    #[tokio::test]
    async fn test_query_range_degenerate_bounds() {
        let table = MemoryTable::new("grid");
        table
            .insert_or_merge(Entity::new("p", "a").with_property("v", blob("x")))
            .await
            .unwrap();

        for range in [RowKeyRange::between("a", "a"), RowKeyRange::between("z", "a")] {
            let rows = table.query_range("p", &range, &Selection::All).await.unwrap();
            assert!(rows.is_empty());
        }
        let rows = table
            .query_range("missing", &RowKeyRange::all(), &Selection::All)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_selection_filters_columns() {
        let table = MemoryTable::new("grid");
        table
            .insert_or_merge(
                Entity::new("p", "a")
                    .with_property("f1", blob("1"))
                    .with_property("f2", blob("2")),
            )
            .await
            .unwrap();

        let rows = table
            .query_range(
                "p",
                &RowKeyRange::all(),
                &Selection::Columns(vec!["f2".into(), "f9".into()]),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].properties.len(), 1);
        assert_eq!(rows[0].get("f2"), Some(&blob("2")));
    }

    #[tokio::test]
    async fn test_batches_are_chunked() {
        let table = MemoryTable::new("grid").with_max_batch_size(3);
        let entities: Vec<_> = (0..10)
            .map(|i| Entity::new("p", format!("{:02}", i)).with_property("v", blob("x")))
            .collect();

        assert_eq!(table.upsert_batch("p", entities).await.unwrap(), 10);
        assert_eq!(table.len().await, 10);

        let keys: Vec<_> = (0..7).map(|i| format!("{:02}", i)).collect();
        assert_eq!(table.delete_batch("p", keys).await.unwrap(), 7);
        assert_eq!(table.len().await, 3);
    }

    #[tokio::test]
    async fn test_oversized_commit_is_rejected() {
        let table = MemoryTable::new("grid").with_max_batch_size(2);
        let entities = (0..3).map(|i| Entity::new("p", i.to_string())).collect();

        let err = table.commit_upserts("p", entities).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::BatchSizeExceeded {
                requested: 3,
                limit: 2
            }
        ));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_upsert_batch_rejects_foreign_partition() {
        let table = MemoryTable::new("grid");
        let err = table
            .upsert_batch("1-0", vec![Entity::new("1-1", "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_delete_removes_empty_partitions() {
        let table = MemoryTable::new("grid");
        table
            .insert_or_merge(Entity::new("p", "a").with_property("v", blob("x")))
            .await
            .unwrap();
        table.delete_batch("p", vec!["a".into(), "zz".into()]).await.unwrap();
        assert!(table.partition_keys().await.is_empty());
    }
}
