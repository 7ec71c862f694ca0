//! Common types and utilities shared across the wx-grid crates.

pub mod error;
pub mod grid;
pub mod time;

pub use error::{ErrorKind, StoreError, StoreResult};
pub use grid::{DataPoint, FieldBatch, FieldGrid, FieldKey, FieldRef, GridCell, Projection};
pub use time::{TimeParseError, TimeRange};
