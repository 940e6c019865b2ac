//! Writer side of the container: splice a blob into a JPEG as APP2 segments.

use super::{SidebandError, SidebandResult};

/// Marker code of the application segment carrying sideband data.
pub const APP2: u8 = 0xE2;

/// Largest payload of one segment (the 16-bit length counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

/// Smallest blob a segment may carry.
pub const MIN_BLOB_LEN: usize = 4;

pub(crate) const SOI: [u8; 2] = [0xFF, 0xD8];

/// Encode `blob` as consecutive APP2 segments.
pub fn segments(blob: &[u8]) -> SidebandResult<Vec<u8>> {
    if blob.len() < MIN_BLOB_LEN {
        return Err(SidebandError::BlobTooSmall { len: blob.len() });
    }
    let count = blob.len().div_ceil(MAX_SEGMENT_PAYLOAD);
    let mut out = Vec::with_capacity(blob.len() + count * 4);
    for chunk in blob.chunks(MAX_SEGMENT_PAYLOAD) {
        let length = (chunk.len() + 2) as u16;
        out.extend_from_slice(&[0xFF, APP2]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(chunk);
    }
    Ok(out)
}

/// Copy of `jpeg` with `blob` inserted right after SOI.
pub fn insert_segments(jpeg: &[u8], blob: &[u8]) -> SidebandResult<Vec<u8>> {
    if !jpeg.starts_with(&SOI) {
        return Err(SidebandError::NotJpeg);
    }
    let segs = segments(blob)?;
    let mut out = Vec::with_capacity(jpeg.len() + segs.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&segs);
    out.extend_from_slice(&jpeg[SOI.len()..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment() {
        let out = insert_segments(&[0xFF, 0xD8, 0xFF, 0xD9], &[1, 2, 3, 4]).unwrap();
        assert_eq!(out, vec![0xFF, 0xD8, 0xFF, 0xE2, 0x00, 0x06, 1, 2, 3, 4, 0xFF, 0xD9]);
    }

    #[test]
    fn test_split_at_segment_limit() {
        let blob = vec![7u8; MAX_SEGMENT_PAYLOAD + 10];
        let segs = segments(&blob).unwrap();
        assert_eq!(&segs[..4], &[0xFF, APP2, 0xFF, 0xFF]);
        let second = 4 + MAX_SEGMENT_PAYLOAD;
        assert_eq!(&segs[second..second + 4], &[0xFF, APP2, 0x00, 12]);
        assert_eq!(segs.len(), blob.len() + 8);
    }

    #[test]
    fn test_rejects_small_blob_and_non_jpeg() {
        assert_eq!(
            insert_segments(&[0xFF, 0xD8], &[1, 2]),
            Err(SidebandError::BlobTooSmall { len: 2 })
        );
        assert_eq!(
            insert_segments(&[0x00, 0xD8], &[1, 2, 3, 4]),
            Err(SidebandError::NotJpeg)
        );
    }
}
