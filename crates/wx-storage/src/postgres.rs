//! PostgreSQL table backend.
//!
//! Entities and their properties live in two tables:
//!
//! ```text
//! {table}        (partition_key, row_key)              -- one row per entity
//! {table}_props  (partition_key, row_key, name, value) -- one row per property
//! ```
//!
//! Row keys use the "C" collation so SQL ordering and comparisons are
//! byte-wise, which is what the lexicographic range filters rely on.
//! Merging a property is an `ON CONFLICT ... DO UPDATE`, so properties
//! not named in an upsert keep their stored value.

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, instrument};

use wx_common::{StoreError, StoreResult};

use crate::config::{is_plain_identifier, TableStoreConfig};
use crate::table::{ensure_batch_fits, Entity, RowKeyRange, Selection, TableClient};

/// Classify a driver error into a store error kind.
pub(crate) fn classify_sqlx(context: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound(context.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => {
            StoreError::Decode(format!("{}: {}", context, err))
        }
        sqlx::Error::Configuration(_) => StoreError::Config(format!("{}: {}", context, err)),
        _ => StoreError::Transient(format!("{}: {}", context, err)),
    }
}

/// Table client backed by PostgreSQL.
pub struct PgTable {
    pool: PgPool,
    table: String,
    max_batch_size: usize,
}

impl PgTable {
    /// Connect using the given configuration.
    pub async fn connect(config: &TableStoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| classify_sqlx("connection failed", e))?;

        Self::from_pool(pool, &config.table_name, config.max_batch_size)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, table: &str, max_batch_size: usize) -> StoreResult<Self> {
        if !is_plain_identifier(table) {
            return Err(StoreError::Config(format!("invalid table name '{}'", table)));
        }

        Ok(Self {
            pool,
            table: table.to_string(),
            max_batch_size: max_batch_size.max(1),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the entity and property tables if missing.
    pub async fn migrate(&self) -> StoreResult<()> {
        let schema = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                partition_key TEXT NOT NULL,
                row_key TEXT COLLATE "C" NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            );

            CREATE TABLE IF NOT EXISTS {t}_props (
                partition_key TEXT NOT NULL,
                row_key TEXT COLLATE "C" NOT NULL,
                name TEXT NOT NULL,
                value BYTEA,
                PRIMARY KEY (partition_key, row_key, name),
                FOREIGN KEY (partition_key, row_key)
                    REFERENCES {t} (partition_key, row_key) ON DELETE CASCADE
            )
            "#,
            t = self.table
        );

        // Split SQL statements and execute them individually
        for statement in schema.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| classify_sqlx("migration failed", e))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TableClient for PgTable {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    #[instrument(skip(self, selection), fields(table = %self.table))]
    async fn query_range(
        &self,
        partition_key: &str,
        range: &RowKeyRange,
        selection: &Selection,
    ) -> StoreResult<Vec<Entity>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let columns: Option<Vec<String>> = match selection {
            Selection::KeysOnly => {
                let sql = format!(
                    "SELECT row_key FROM {t} \
                     WHERE partition_key = $1 \
                     AND ($2::text IS NULL OR row_key > $2 COLLATE \"C\") \
                     AND ($3::text IS NULL OR row_key < $3 COLLATE \"C\") \
                     ORDER BY row_key",
                    t = self.table
                );
                let keys = sqlx::query_scalar::<_, String>(&sql)
                    .bind(partition_key)
                    .bind(range.after.as_deref())
                    .bind(range.before.as_deref())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| classify_sqlx("range query failed", e))?;

                return Ok(keys
                    .into_iter()
                    .map(|row_key| Entity::new(partition_key, row_key))
                    .collect());
            }
            Selection::Columns(cols) => Some(cols.clone()),
            Selection::All => None,
        };

        let sql = format!(
            "SELECT e.row_key, p.name, p.value FROM {t} e \
             LEFT JOIN {t}_props p \
               ON p.partition_key = e.partition_key AND p.row_key = e.row_key \
               AND ($4::text[] IS NULL OR p.name = ANY($4)) \
             WHERE e.partition_key = $1 \
             AND ($2::text IS NULL OR e.row_key > $2 COLLATE \"C\") \
             AND ($3::text IS NULL OR e.row_key < $3 COLLATE \"C\") \
             ORDER BY e.row_key",
            t = self.table
        );

        let rows = sqlx::query_as::<_, (String, Option<String>, Option<Vec<u8>>)>(&sql)
            .bind(partition_key)
            .bind(range.after.as_deref())
            .bind(range.before.as_deref())
            .bind(columns)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify_sqlx("range query failed", e))?;

        // Rows arrive grouped by row key; fold each group into one entity
        let mut entities: Vec<Entity> = Vec::new();
        for (row_key, name, value) in rows {
            let start_new = entities.last().map_or(true, |e| e.row_key != row_key);
            if start_new {
                entities.push(Entity::new(partition_key, row_key));
            }
            if let (Some(name), Some(entity)) = (name, entities.last_mut()) {
                entity.set(name, value.map(Bytes::from));
            }
        }

        debug!(partition = %partition_key, rows = entities.len(), "Range query complete");
        Ok(entities)
    }

    #[instrument(skip(self, entities), fields(table = %self.table, count = entities.len()))]
    async fn commit_upserts(
        &self,
        partition_key: &str,
        entities: Vec<Entity>,
    ) -> StoreResult<()> {
        ensure_batch_fits(entities.len(), self.max_batch_size)?;

        let insert_entity = format!(
            "INSERT INTO {t} (partition_key, row_key) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            t = self.table
        );
        let merge_property = format!(
            "INSERT INTO {t}_props (partition_key, row_key, name, value) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (partition_key, row_key, name) DO UPDATE SET value = EXCLUDED.value",
            t = self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify_sqlx("begin failed", e))?;

        for entity in &entities {
            sqlx::query(&insert_entity)
                .bind(partition_key)
                .bind(&entity.row_key)
                .execute(&mut *tx)
                .await
                .map_err(|e| classify_sqlx("entity insert failed", e))?;

            for (name, value) in &entity.properties {
                sqlx::query(&merge_property)
                    .bind(partition_key)
                    .bind(&entity.row_key)
                    .bind(name)
                    .bind(value.as_ref().map(|b| b.as_ref()))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| classify_sqlx("property merge failed", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| classify_sqlx("commit failed", e))?;

        Ok(())
    }

    #[instrument(skip(self, row_keys), fields(table = %self.table, count = row_keys.len()))]
    async fn commit_deletes(
        &self,
        partition_key: &str,
        row_keys: Vec<String>,
    ) -> StoreResult<()> {
        ensure_batch_fits(row_keys.len(), self.max_batch_size)?;

        // Property rows follow via ON DELETE CASCADE
        let sql = format!(
            "DELETE FROM {t} WHERE partition_key = $1 AND row_key = ANY($2)",
            t = self.table
        );
        sqlx::query(&sql)
            .bind(partition_key)
            .bind(&row_keys)
            .execute(&self.pool)
            .await
            .map_err(|e| classify_sqlx("delete failed", e))?;

        Ok(())
    }
}
