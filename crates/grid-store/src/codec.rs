//! Encoding of one grid row of one field.
//!
//! A row of `n_x` f32 values is written as raw native-endian bytes and
//! zlib-compressed. Reading a single column still inflates the whole
//! row: deflate streams cannot be entered at an arbitrary offset.

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use wx_common::{StoreError, StoreResult};

const VALUE_SIZE: usize = std::mem::size_of::<f32>();

/// Packs and unpacks grid rows.
#[derive(Debug, Clone, Copy)]
pub struct GridCodec {
    level: Compression,
}

impl Default for GridCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

impl GridCodec {
    /// Codec compressing at `level` (0-9, clamped).
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// Compress one row.
    pub fn encode_row(&self, values: &[f32]) -> StoreResult<Bytes> {
        let raw: &[u8] = bytemuck::cast_slice(values);

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), self.level);
        encoder
            .write_all(raw)
            .map_err(|e| StoreError::Internal(format!("row compression failed: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| StoreError::Internal(format!("row compression failed: {}", e)))?;

        Ok(Bytes::from(compressed))
    }

    /// Inflate a blob into its raw bytes, checking it holds whole f32s.
    fn inflate(&self, blob: &[u8]) -> StoreResult<Vec<u8>> {
        let mut raw = Vec::new();
        ZlibDecoder::new(blob)
            .read_to_end(&mut raw)
            .map_err(|e| StoreError::Decode(format!("row decompression failed: {}", e)))?;

        if raw.len() % VALUE_SIZE != 0 {
            return Err(StoreError::Decode(format!(
                "row payload of {} bytes is not a whole number of f32 values",
                raw.len()
            )));
        }
        Ok(raw)
    }

    /// Decode a whole row.
    pub fn decode_row(&self, blob: &[u8]) -> StoreResult<Vec<f32>> {
        let raw = self.inflate(blob)?;
        Ok(raw
            .chunks_exact(VALUE_SIZE)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect())
    }

    /// Decode the row and return the value in column `x`.
    pub fn decode_column(&self, blob: &[u8], x: usize) -> StoreResult<f32> {
        let raw = self.inflate(blob)?;
        let width = raw.len() / VALUE_SIZE;
        if x >= width {
            return Err(StoreError::Decode(format!(
                "column {} beyond stored row of width {}",
                x, width
            )));
        }

        let offset = x * VALUE_SIZE;
        Ok(bytemuck::pod_read_unaligned(&raw[offset..offset + VALUE_SIZE]))
    }
}
