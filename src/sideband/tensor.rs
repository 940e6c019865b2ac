//! Raw-tensor payload records.
//!
//! Each record is `want_float u8 | is_preallocated u8 | index u32 | size u32`
//! followed by `size` data bytes. Records are packed back to back; a reader
//! advances by the record's own `size`, no offset table is needed.

use super::{read_slice, read_u32, read_u8, SidebandError, SidebandResult};

/// Fixed bytes preceding every record's data.
pub const TENSOR_RECORD_OVERHEAD: usize = 10;

/// One owned NPU output tensor as produced by the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NpuTensor {
    pub want_float: bool,
    pub is_preallocated: bool,
    pub index: u32,
    pub data: Vec<u8>,
}

impl NpuTensor {
    pub fn new(index: u32, data: Vec<u8>) -> Self {
        Self {
            want_float: false,
            is_preallocated: false,
            index,
            data,
        }
    }

    /// Tensor of `f32` values, stored little-endian.
    pub fn from_f32(index: u32, values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self {
            want_float: true,
            ..Self::new(index, data)
        }
    }

    /// Encoded length including the fixed record overhead.
    pub fn encoded_len(&self) -> usize {
        TENSOR_RECORD_OVERHEAD + self.data.len()
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> SidebandResult<()> {
        let size = u32::try_from(self.data.len())
            .map_err(|_| SidebandError::BlobTooLarge { len: self.data.len() })?;
        out.push(self.want_float as u8);
        out.push(self.is_preallocated as u8);
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Borrowed view of one record inside a received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorRecord<'a> {
    pub want_float: bool,
    pub is_preallocated: bool,
    pub index: u32,
    pub data: &'a [u8],
}

impl TensorRecord<'_> {
    /// Data reinterpreted as little-endian `f32` values. Trailing bytes that
    /// do not form a whole value are ignored.
    pub fn as_f32(&self) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn to_tensor(&self) -> NpuTensor {
        NpuTensor {
            want_float: self.want_float,
            is_preallocated: self.is_preallocated,
            index: self.index,
            data: self.data.to_vec(),
        }
    }
}

/// Walk `count` records of `payload`. The records must consume the payload
/// exactly.
pub fn walk(payload: &[u8], count: u32) -> SidebandResult<Vec<TensorRecord<'_>>> {
    let mut cursor = 0usize;
    let mut records = Vec::with_capacity(count.min(64) as usize);
    for index in 0..count as usize {
        let start = cursor;
        let truncated = || SidebandError::TruncatedRecord {
            index,
            offset: start,
        };
        let want_float = read_u8(payload, &mut cursor).ok_or_else(truncated)?;
        let is_preallocated = read_u8(payload, &mut cursor).ok_or_else(truncated)?;
        let tensor_index = read_u32(payload, &mut cursor).ok_or_else(truncated)?;
        let size = read_u32(payload, &mut cursor).ok_or_else(truncated)?;
        let data = read_slice(payload, &mut cursor, size as usize).ok_or_else(truncated)?;
        records.push(TensorRecord {
            want_float: want_float != 0,
            is_preallocated: is_preallocated != 0,
            index: tensor_index,
            data,
        });
    }
    if cursor != payload.len() {
        return Err(SidebandError::SizeMismatch {
            declared: payload.len(),
            actual: cursor,
        });
    }
    Ok(records)
}
