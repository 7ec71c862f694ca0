//! Storage abstractions for wx-grid.
//!
//! Provides unified interfaces for:
//! - A partition/row-keyed table store (in-memory or PostgreSQL) holding
//!   the encoded grid rows
//! - The projection/field catalog the engines consult

pub mod catalog;
pub mod config;
pub mod memory;
pub mod postgres;
pub mod table;

pub use catalog::{Catalog, MemoryCatalog, PgCatalog};
pub use config::TableStoreConfig;
pub use memory::MemoryTable;
pub use postgres::PgTable;
pub use table::{ensure_batch_fits, Entity, RowKeyRange, Selection, TableClient};
