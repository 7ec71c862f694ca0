//! Row-partitioned storage of gridded forecast fields.
//!
//! Each projection grid row is one partition of a partition/row-keyed
//! table store. Each record in a partition is one (valid, run) time pair
//! and holds one compressed row of values per field:
//!
//! ```text
//! partition "1-0"  (projection 1, y = 0)
//!   "2024-01-01T00:00:00Z,2024-01-01T00:00:00Z"   f7: zlib([f32; n_x])  f8: ...
//!   "2024-01-01T01:00:00Z,2024-01-01T00:00:00Z"   f7: ...
//! partition "1-1"  (projection 1, y = 1)
//!   ...
//! ```
//!
//! Because row keys sort by valid time, a time window is a plain row-key
//! range. Reads fan out over time sub-windows of one partition; writes
//! and retention fan out over partitions.
//!
//! # Example
//!
//! ```ignore
//! use grid_store::{DataProvider, GridStore, GridStoreConfig, Telemetry};
//!
//! let store = GridStore::new(table, catalog, GridStoreConfig::from_env(), Telemetry::disabled())?;
//! let points = store
//!     .get_fields(1, GridCell::new(1, 1), &[7], TimeRange::new(start, end))
//!     .await?;
//! ```

pub mod codec;
pub mod config;
pub mod keys;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod telemetry;

mod clean;
mod fetch;
mod put;

// Re-export commonly used types at crate root
pub use codec::GridCodec;
pub use config::GridStoreConfig;
pub use provider::{CleanReport, DataProvider, PartitionFailure, PutReport};
pub use store::GridStore;
pub use telemetry::{StoreMetrics, StoreMetricsSnapshot, Telemetry};
