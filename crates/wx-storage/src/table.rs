//! Table client facade over a partition/row-keyed entity store.
//!
//! Entities live in partitions and are ordered by row key inside a
//! partition. Range queries filter by partition equality and strict
//! row-key inequality; writes merge properties into existing entities.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

use wx_common::{StoreError, StoreResult};

/// One stored entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    /// Named properties. `None` is a stored null.
    pub properties: BTreeMap<String, Option<Bytes>>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Bytes) -> Self {
        self.properties.insert(name.into(), Some(value));
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<Bytes>) {
        self.properties.insert(name.into(), value);
    }

    /// Non-null value of a property, if present.
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.properties.get(name).and_then(Option::as_ref)
    }
}

/// Strict row-key bounds. `None` leaves that side open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowKeyRange {
    /// Only keys strictly greater than this.
    pub after: Option<String>,
    /// Only keys strictly less than this.
    pub before: Option<String>,
}

impl RowKeyRange {
    pub fn between(after: impl Into<String>, before: impl Into<String>) -> Self {
        Self {
            after: Some(after.into()),
            before: Some(before.into()),
        }
    }

    pub fn before(before: impl Into<String>) -> Self {
        Self {
            after: None,
            before: Some(before.into()),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, row_key: &str) -> bool {
        self.after.as_deref().map_or(true, |a| row_key > a)
            && self.before.as_deref().map_or(true, |b| row_key < b)
    }

    /// True when no key can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        matches!((&self.after, &self.before), (Some(a), Some(b)) if a >= b)
    }
}

/// Which properties a query returns besides the keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    KeysOnly,
    Columns(Vec<String>),
    All,
}

impl Selection {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Selection::KeysOnly => false,
            Selection::Columns(cols) => cols.iter().any(|c| c == name),
            Selection::All => true,
        }
    }
}

/// Reject a single commit larger than the store accepts.
pub fn ensure_batch_fits(requested: usize, limit: usize) -> StoreResult<()> {
    if requested > limit {
        return Err(StoreError::BatchSizeExceeded { requested, limit });
    }
    Ok(())
}

/// Access to one logical table.
///
/// Backends implement the single-chunk primitives; the provided batch
/// methods split input into chunks of at most [`max_batch_size`]
/// entities. A failing chunk aborts the call but does not undo chunks
/// that were already committed. No retries happen at this layer.
///
/// [`max_batch_size`]: TableClient::max_batch_size
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Name of the table this client is scoped to.
    fn table_name(&self) -> &str;

    /// Largest number of entities one commit may carry.
    fn max_batch_size(&self) -> usize;

    /// Entities of one partition whose row key lies in `range`, ordered
    /// by row key ascending.
    async fn query_range(
        &self,
        partition_key: &str,
        range: &RowKeyRange,
        selection: &Selection,
    ) -> StoreResult<Vec<Entity>>;

    /// Insert-or-merge at most `max_batch_size` entities of one partition
    /// as a unit. Properties absent from an entity are left untouched.
    async fn commit_upserts(&self, partition_key: &str, entities: Vec<Entity>)
        -> StoreResult<()>;

    /// Delete at most `max_batch_size` rows of one partition as a unit.
    async fn commit_deletes(&self, partition_key: &str, row_keys: Vec<String>)
        -> StoreResult<()>;

    /// Insert-or-merge a single entity.
    async fn insert_or_merge(&self, entity: Entity) -> StoreResult<()> {
        let partition_key = entity.partition_key.clone();
        self.commit_upserts(&partition_key, vec![entity]).await
    }

    /// Insert-or-merge any number of entities of one partition.
    ///
    /// Returns the number of entities committed.
    async fn upsert_batch(&self, partition_key: &str, entities: Vec<Entity>) -> StoreResult<usize> {
        if let Some(stray) = entities.iter().find(|e| e.partition_key != partition_key) {
            return Err(StoreError::invalid_argument(
                "partition_key",
                format!(
                    "entity {} belongs to partition {}, batch is for {}",
                    stray.row_key, stray.partition_key, partition_key
                ),
            ));
        }

        let limit = self.max_batch_size().max(1);
        let mut committed = 0;
        let mut remaining = entities.into_iter();
        loop {
            let chunk: Vec<Entity> = remaining.by_ref().take(limit).collect();
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            self.commit_upserts(partition_key, chunk).await?;
            committed += len;
        }
        Ok(committed)
    }

    /// Delete any number of rows of one partition.
    ///
    /// Returns the number of row keys submitted in committed chunks.
    async fn delete_batch(&self, partition_key: &str, row_keys: Vec<String>) -> StoreResult<usize> {
        let limit = self.max_batch_size().max(1);
        let mut committed = 0;
        for chunk in row_keys.chunks(limit) {
            self.commit_deletes(partition_key, chunk.to_vec()).await?;
            committed += chunk.len();
        }
        Ok(committed)
    }
}
