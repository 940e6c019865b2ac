//! Host side: find and reassemble sideband data in a received JPEG.

use super::header::{SidebandHeader, HEADER_LEN};
use super::marker::{APP2, SOI};
use super::{SidebandError, SidebandResult};

/// More consecutive `0xFF` bytes than this before a marker code is corruption.
const MAX_MARKER_FILL: usize = 16;

const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;

/// Validated sideband data of one picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub header: SidebandHeader,
    /// Exactly `header.output_size` bytes.
    pub payload: Vec<u8>,
}

impl ExtractedMetadata {
    /// Split a reassembled blob into header and payload, checking that the
    /// blob is exactly as long as the header declares.
    pub fn from_blob(mut blob: Vec<u8>) -> SidebandResult<Self> {
        let header = SidebandHeader::parse(&blob)?;
        if blob.len() != header.blob_len() {
            return Err(SidebandError::SizeMismatch {
                declared: header.blob_len(),
                actual: blob.len(),
            });
        }
        let payload = blob.split_off(HEADER_LEN);
        Ok(Self { header, payload })
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// Concatenate the payloads of every APP2 segment before the scan data.
///
/// Returns `None` when the bitstream carries no APP2 segment at all.
pub fn collect_app2(bitstream: &[u8]) -> SidebandResult<Option<Vec<u8>>> {
    if !bitstream.starts_with(&SOI) {
        return Err(SidebandError::NotJpeg);
    }
    let len = bitstream.len();
    let mut pos = SOI.len();
    let mut accumulated: Option<Vec<u8>> = None;

    while pos < len {
        let fill_start = pos;
        while pos < len && bitstream[pos] == 0xFF {
            pos += 1;
        }
        let fill = pos - fill_start;
        if fill > MAX_MARKER_FILL {
            return Err(SidebandError::ExcessivePadding { offset: fill_start });
        }
        if pos >= len {
            break;
        }
        // The 0xFF prefix is optional; the next byte is the marker code either way.
        let code = bitstream[pos];
        pos += 1;
        if code == EOI || code == SOS {
            break;
        }

        // Truncated length field: nothing more to scan.
        if pos + 2 > len {
            break;
        }
        let length = u16::from_be_bytes([bitstream[pos], bitstream[pos + 1]]);
        if length < 2 {
            return Err(SidebandError::BadSegmentLength {
                offset: pos,
                length,
            });
        }
        pos += 2;
        let body = length as usize - 2;
        if pos + body > len {
            return Err(SidebandError::PrematureEnd {
                offset: pos,
                needed: body,
                available: len - pos,
            });
        }
        if code == APP2 {
            accumulated
                .get_or_insert_with(Vec::new)
                .extend_from_slice(&bitstream[pos..pos + body]);
        }
        pos += body;
    }
    Ok(accumulated)
}

/// Extract and validate the sideband blob of a JPEG bitstream.
///
/// `Ok(None)` means the picture carries no sideband data, which is normal
/// for uninstrumented sources.
pub fn extract(bitstream: &[u8]) -> SidebandResult<Option<ExtractedMetadata>> {
    match collect_app2(bitstream)? {
        Some(blob) => ExtractedMetadata::from_blob(blob).map(Some),
        None => Ok(None),
    }
}
