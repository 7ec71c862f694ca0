//! JSON field batches for the `put` command.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use wx_common::{FieldBatch, FieldGrid, FieldKey};

/// One entry of a batch file.
#[derive(Debug, Deserialize)]
pub struct BatchEntry {
    pub field_id: i32,
    pub valid_time: DateTime<Utc>,
    pub run_time: DateTime<Utc>,
    /// Grids as rows of values, row 0 first.
    pub grids: Vec<Vec<Vec<f32>>>,
}

/// Build a field batch from JSON text. Entries repeating a key append
/// their grids, so the last one written wins.
pub fn parse_batch(json: &str) -> Result<FieldBatch> {
    let entries: Vec<BatchEntry> = serde_json::from_str(json).context("Invalid batch JSON")?;

    let mut batch = FieldBatch::new();
    for (i, entry) in entries.into_iter().enumerate() {
        let key = FieldKey::new(entry.field_id, entry.valid_time, entry.run_time);
        let grids = batch.entry(key).or_default();
        for rows in entry.grids {
            let grid = FieldGrid::from_rows(rows)
                .with_context(|| format!("Entry {} (field {})", i, entry.field_id))?;
            grids.push(grid);
        }
    }
    Ok(batch)
}

pub fn load_batch(path: impl AsRef<Path>) -> Result<FieldBatch> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_batch(&json)
}
