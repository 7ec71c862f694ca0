//! Projection and field catalog.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::collections::BTreeMap;

use wx_common::{FieldRef, Projection, StoreError, StoreResult};

use crate::config::TableStoreConfig;
use crate::postgres::classify_sqlx;

/// Read access to the projections and fields known to the system.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All projections, ordered by id.
    async fn list_projections(&self) -> StoreResult<Vec<Projection>>;

    /// Look up one projection; `NotFound` when absent.
    async fn get_projection(&self, id: i32) -> StoreResult<Projection>;

    /// Look up fields by id, in the order requested.
    ///
    /// Fails with `NotFound` if any id is unknown.
    async fn get_fields(&self, ids: &[i32]) -> StoreResult<Vec<FieldRef>>;
}

/// Catalog held in memory, built up front.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    projections: BTreeMap<i32, Projection>,
    fields: BTreeMap<i32, FieldRef>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projections.insert(projection.id, projection);
        self
    }

    pub fn with_field(mut self, field: FieldRef) -> Self {
        self.fields.insert(field.id, field);
        self
    }
}

fn missing_fields(ids: &[i32], found: &[FieldRef]) -> StoreError {
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.iter().any(|f| f.id == **id))
        .map(|id| id.to_string())
        .collect();
    StoreError::NotFound(format!("fields [{}]", missing.join(", ")))
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_projections(&self) -> StoreResult<Vec<Projection>> {
        Ok(self.projections.values().copied().collect())
    }

    async fn get_projection(&self, id: i32) -> StoreResult<Projection> {
        self.projections
            .get(&id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("projection {}", id)))
    }

    async fn get_fields(&self, ids: &[i32]) -> StoreResult<Vec<FieldRef>> {
        let found: Vec<FieldRef> = ids
            .iter()
            .filter_map(|id| self.fields.get(id).copied())
            .collect();

        if found.len() != ids.len() {
            return Err(missing_fields(ids, &found));
        }
        Ok(found)
    }
}

/// Catalog stored in PostgreSQL.
pub struct PgCatalog {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct ProjectionRow {
    id: i32,
    n_x: i32,
    n_y: i32,
}

impl TryFrom<ProjectionRow> for Projection {
    type Error = StoreError;

    fn try_from(row: ProjectionRow) -> StoreResult<Self> {
        let dim = |v: i32, name: &str| {
            usize::try_from(v).map_err(|_| {
                StoreError::Decode(format!("projection {} has negative {}: {}", row.id, name, v))
            })
        };
        Ok(Projection::new(row.id, dim(row.n_x, "n_x")?, dim(row.n_y, "n_y")?))
    }
}

#[derive(Debug, FromRow)]
struct FieldRow {
    id: i32,
    metric_id: i32,
}

impl PgCatalog {
    /// Connect using the given configuration.
    pub async fn connect(config: &TableStoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| classify_sqlx("catalog connection failed", e))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| classify_sqlx("catalog migration failed", e))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn list_projections(&self) -> StoreResult<Vec<Projection>> {
        let rows = sqlx::query_as::<_, ProjectionRow>(
            "SELECT id, n_x, n_y FROM projections ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify_sqlx("list projections", e))?;

        rows.into_iter().map(Projection::try_from).collect()
    }

    async fn get_projection(&self, id: i32) -> StoreResult<Projection> {
        let row = sqlx::query_as::<_, ProjectionRow>(
            "SELECT id, n_x, n_y FROM projections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify_sqlx("get projection", e))?
        .ok_or_else(|| StoreError::NotFound(format!("projection {}", id)))?;

        Projection::try_from(row)
    }

    async fn get_fields(&self, ids: &[i32]) -> StoreResult<Vec<FieldRef>> {
        let rows = sqlx::query_as::<_, FieldRow>(
            "SELECT id, metric_id FROM source_fields WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify_sqlx("get fields", e))?;

        // Restore request order
        let found: Vec<FieldRef> = ids
            .iter()
            .filter_map(|id| rows.iter().find(|r| r.id == *id))
            .map(|r| FieldRef::new(r.id, r.metric_id))
            .collect();

        if found.len() != ids.len() {
            return Err(missing_fields(ids, &found));
        }
        Ok(found)
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projections (
    id INTEGER PRIMARY KEY,
    n_x INTEGER NOT NULL CHECK (n_x > 0),
    n_y INTEGER NOT NULL CHECK (n_y > 0)
);

CREATE TABLE IF NOT EXISTS source_fields (
    id INTEGER PRIMARY KEY,
    projection_id INTEGER NOT NULL REFERENCES projections (id),
    metric_id INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_source_fields_projection ON source_fields (projection_id);
"#;
