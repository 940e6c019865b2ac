//! Sideband inference metadata carried inside JPEG marker segments.
//!
//! The device serializes one [`SidebandHeader`] plus the inference payload
//! into a blob and splices it into the encoded picture as one or more APP2
//! (`0xFFE2`) segments. The host scans the bitstream, reassembles the APP2
//! payloads and validates the blob before handing it to the decoders.
//!
//! ```text
//! SOI | FFE2 len blob[0..65533] | FFE2 len blob[65533..] | ... | SOS ...
//! ```
//!
//! All multi-byte fields of the blob are little-endian; the segment length
//! field is big-endian as the container requires.

pub mod embed;
pub mod extract;
pub mod header;
pub mod marker;
pub mod tensor;

pub use embed::{embed, embed_with, InferenceOutput, InferencePayload};
pub use extract::{extract, ExtractedMetadata};
pub use header::{ModelIdentifier, OutputType, SidebandHeader, HEADER_LEN, MODEL_ID_LEN};
pub use marker::{insert_segments, APP2, MAX_SEGMENT_PAYLOAD};
pub use tensor::{NpuTensor, TensorRecord, TENSOR_RECORD_OVERHEAD};

use thiserror::Error;

/// Wire-level corruption of sideband data.
///
/// Every variant only invalidates the metadata of one picture; the picture
/// itself stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SidebandError {
    #[error("Bitstream does not start with SOI")]
    NotJpeg,

    #[error("More than 16 padding bytes before marker at offset {offset}")]
    ExcessivePadding { offset: usize },

    #[error("Segment length {length} at offset {offset} is below 2")]
    BadSegmentLength { offset: usize, length: u16 },

    #[error("Premature end: segment at offset {offset} needs {needed} bytes, {available} left")]
    PrematureEnd {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Header declares {declared} bytes but {actual} were carried")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("Tensor record {index} truncated at payload offset {offset}")]
    TruncatedRecord { index: usize, offset: usize },

    #[error("Sideband blob of {len} bytes is shorter than the header")]
    HeaderTooShort { len: usize },

    #[error("Unknown NPU output type {0}")]
    UnknownOutputType(u32),

    #[error("Payload of {len} bytes does not fit the size field")]
    BlobTooLarge { len: usize },

    #[error("Sideband blob of {len} bytes is too small for a marker segment")]
    BlobTooSmall { len: usize },
}

pub type SidebandResult<T> = std::result::Result<T, SidebandError>;

// ── Little-endian cursor helpers ──

pub(crate) fn read_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Option<&'a [u8]> {
    let end = cursor.checked_add(len)?;
    let out = bytes.get(*cursor..end)?;
    *cursor = end;
    Some(out)
}

pub(crate) fn read_u8(bytes: &[u8], cursor: &mut usize) -> Option<u8> {
    read_slice(bytes, cursor, 1).map(|s| s[0])
}

pub(crate) fn read_u32(bytes: &[u8], cursor: &mut usize) -> Option<u32> {
    let s = read_slice(bytes, cursor, 4)?;
    Some(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
}

pub(crate) fn read_i32(bytes: &[u8], cursor: &mut usize) -> Option<i32> {
    read_u32(bytes, cursor).map(|v| v as i32)
}

pub(crate) fn read_f32(bytes: &[u8], cursor: &mut usize) -> Option<f32> {
    read_u32(bytes, cursor).map(f32::from_bits)
}

pub(crate) fn read_u64(bytes: &[u8], cursor: &mut usize) -> Option<u64> {
    let s = read_slice(bytes, cursor, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(s);
    Some(u64::from_le_bytes(raw))
}
