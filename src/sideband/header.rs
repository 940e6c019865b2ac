//! Fixed-size sideband header.
//!
//! Layout (packed, little-endian):
//!
//! | offset | field                   | type      |
//! |--------|-------------------------|-----------|
//! | 0      | picture_timestamp       | u64       |
//! | 8      | npu_output_type         | u32       |
//! | 12     | model_identifier        | [u8; 32]  |
//! | 44     | width                   | u32       |
//! | 48     | height                  | u32       |
//! | 52     | npu_outputs_timestamp   | u64       |
//! | 60     | npu_output_size         | u32       |
//! | 64     | npu_outputs_num         | u32       |

use super::{read_slice, read_u32, read_u64, SidebandError, SidebandResult};
use crate::error::{Error, Result};
use crate::types::Geometry;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Size of the encoded header in bytes.
pub const HEADER_LEN: usize = 68;

/// Size of the NUL-padded model identifier field.
pub const MODEL_ID_LEN: usize = 32;

/// How the payload following the header is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    /// No payload.
    #[default]
    None,
    /// Self-describing tensor records, post-processed on the host.
    RawTensor,
    /// Array of model-specific fixed-size structs, used as is.
    FixedRecord,
}

impl OutputType {
    pub fn to_wire(self) -> u32 {
        match self {
            OutputType::None => 0,
            OutputType::RawTensor => 1,
            OutputType::FixedRecord => 2,
        }
    }

    pub fn from_wire(value: u32) -> SidebandResult<Self> {
        match value {
            0 => Ok(OutputType::None),
            1 => Ok(OutputType::RawTensor),
            2 => Ok(OutputType::FixedRecord),
            other => Err(SidebandError::UnknownOutputType(other)),
        }
    }

    /// Output type implied by a model name prefix (`rknn_*` or `rockx_*`).
    pub fn for_model(name: &str) -> Self {
        if name.starts_with("rknn_") {
            OutputType::RawTensor
        } else if name.starts_with("rockx_") {
            OutputType::FixedRecord
        } else {
            OutputType::None
        }
    }
}

/// Fixed 32-byte, NUL-padded model name used as the decoder dispatch key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModelIdentifier([u8; MODEL_ID_LEN]);

impl ModelIdentifier {
    /// Build from a name of at most 31 bytes so the field stays NUL-terminated.
    pub fn new(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() >= MODEL_ID_LEN {
            return Err(Error::Config(format!(
                "model identifier '{}' exceeds {} bytes",
                name,
                MODEL_ID_LEN - 1
            )));
        }
        if bytes.contains(&0) {
            return Err(Error::Config(format!(
                "model identifier {:?} contains NUL",
                name
            )));
        }
        let mut raw = [0u8; MODEL_ID_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// Take the field as read from the wire. Bytes after the first NUL are
    /// cleared so that stale trailing bytes never affect comparisons.
    pub fn from_wire(mut raw: [u8; MODEL_ID_LEN]) -> Self {
        if let Some(nul) = raw.iter().position(|b| *b == 0) {
            raw[nul..].fill(0);
        }
        Self(raw)
    }

    pub fn raw(&self) -> &[u8; MODEL_ID_LEN] {
        &self.0
    }

    /// Name bytes up to the first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(MODEL_ID_LEN);
        &self.0[..end]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl fmt::Debug for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelIdentifier({:?})", self.name())
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Header preceding every sideband payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SidebandHeader {
    pub picture_timestamp: u64,
    pub output_type: OutputType,
    pub model: ModelIdentifier,
    /// Input geometry of the NPU model; result coordinates live in this space.
    pub geometry: Geometry,
    pub outputs_timestamp: u64,
    /// Bytes of payload following the header.
    pub output_size: u32,
    /// Tensor records or fixed records in the payload.
    pub outputs_num: u32,
}

impl SidebandHeader {
    /// Header template for one model; payload fields start at zero.
    pub fn new(model: ModelIdentifier, output_type: OutputType, geometry: Geometry) -> Self {
        Self {
            model,
            output_type,
            geometry,
            ..Default::default()
        }
    }

    pub fn with_picture_timestamp(mut self, timestamp_us: u64) -> Self {
        self.picture_timestamp = timestamp_us;
        self
    }

    /// Total blob length this header describes.
    pub fn blob_len(&self) -> usize {
        HEADER_LEN + self.output_size as usize
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.picture_timestamp.to_le_bytes());
        out.extend_from_slice(&self.output_type.to_wire().to_le_bytes());
        out.extend_from_slice(self.model.raw());
        out.extend_from_slice(&self.geometry.width.to_le_bytes());
        out.extend_from_slice(&self.geometry.height.to_le_bytes());
        out.extend_from_slice(&self.outputs_timestamp.to_le_bytes());
        out.extend_from_slice(&self.output_size.to_le_bytes());
        out.extend_from_slice(&self.outputs_num.to_le_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        self.write_to(&mut out);
        out
    }

    /// Parse the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> SidebandResult<Self> {
        let short = || SidebandError::HeaderTooShort { len: bytes.len() };
        let mut cursor = 0usize;
        let picture_timestamp = read_u64(bytes, &mut cursor).ok_or_else(short)?;
        let output_type = read_u32(bytes, &mut cursor).ok_or_else(short)?;
        let model = read_slice(bytes, &mut cursor, MODEL_ID_LEN).ok_or_else(short)?;
        let width = read_u32(bytes, &mut cursor).ok_or_else(short)?;
        let height = read_u32(bytes, &mut cursor).ok_or_else(short)?;
        let outputs_timestamp = read_u64(bytes, &mut cursor).ok_or_else(short)?;
        let output_size = read_u32(bytes, &mut cursor).ok_or_else(short)?;
        let outputs_num = read_u32(bytes, &mut cursor).ok_or_else(short)?;
        debug_assert_eq!(cursor, HEADER_LEN);

        let mut raw = [0u8; MODEL_ID_LEN];
        raw.copy_from_slice(model);
        Ok(Self {
            picture_timestamp,
            output_type: OutputType::from_wire(output_type)?,
            model: ModelIdentifier::from_wire(raw),
            geometry: Geometry::new(width, height),
            outputs_timestamp,
            output_size,
            outputs_num,
        })
    }
}
