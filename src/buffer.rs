//! Media buffer handles flowing through the graph.
//!
//! A `MediaBuffer` is a cheap-to-clone handle: the bytes live behind an `Arc`
//! and are never mutated once the handle is built. Downstream nodes may keep
//! as many clones as they like; producers that want to change pixels build a
//! new buffer instead.
//!
//! Each buffer may carry an ordered list of *related* buffers, e.g. the
//! full-resolution picture that a small inference result was computed from.
//! Related lists are fixed at construction, so a buffer can only point at
//! buffers that already existed and no reference cycle can be formed.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Pixel layouts understood by the render and overlay flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Nv12,
    Yuv420p,
    Rgb888,
    Bgr888,
    Rgb565,
}

impl PixelFormat {
    /// Bytes needed for a tightly packed frame of this format, `None` if
    /// that overflows `usize`.
    pub fn frame_size(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            PixelFormat::Nv12 | PixelFormat::Yuv420p => pixels.checked_mul(3).map(|n| n / 2),
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => pixels.checked_mul(3),
            PixelFormat::Rgb565 => pixels.checked_mul(2),
        }
    }
}

/// Empty byte vector with room for `capacity` bytes, failing instead of
/// aborting when memory is short.
pub fn reserve(capacity: usize) -> crate::Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(capacity)
        .map_err(|_| crate::Error::Allocation { requested: capacity })?;
    Ok(data)
}

/// What a buffer's bytes represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Raw picture.
    Image {
        format: PixelFormat,
        width: u32,
        height: u32,
    },
    /// Compressed JPEG bitstream.
    Jpeg,
    /// Inference output; the structured value rides in the user data.
    Inference,
    /// Anything else.
    Opaque,
}

/// Shared handle to a block of frame data plus its metadata.
#[derive(Clone)]
pub struct MediaBuffer {
    data: Arc<Vec<u8>>,
    valid_size: usize,
    timestamp_us: u64,
    kind: BufferKind,
    valid: bool,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
    related: Arc<[MediaBuffer]>,
}

impl MediaBuffer {
    /// Wrap owned bytes. The whole vector counts as valid data.
    pub fn new(data: Vec<u8>, kind: BufferKind) -> Self {
        let valid_size = data.len();
        Self {
            data: Arc::new(data),
            valid_size,
            timestamp_us: 0,
            kind,
            valid: true,
            user_data: None,
            related: Arc::from(Vec::new()),
        }
    }

    /// A buffer with no bytes that only carries a typed value.
    pub fn with_value<T: Any + Send + Sync>(value: T, kind: BufferKind) -> Self {
        Self::new(Vec::new(), kind).with_user_data(Arc::new(value))
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::new(data, BufferKind::Jpeg)
    }

    pub fn image(data: Vec<u8>, format: PixelFormat, width: u32, height: u32) -> Self {
        Self::new(
            data,
            BufferKind::Image {
                format,
                width,
                height,
            },
        )
    }

    // ── Builders (return new handles, the original is untouched) ──

    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn with_valid_size(mut self, valid_size: usize) -> Self {
        self.valid_size = valid_size.min(self.data.len());
        self
    }

    pub fn with_validity(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn with_user_data(mut self, user_data: Arc<dyn Any + Send + Sync>) -> Self {
        self.user_data = Some(user_data);
        self
    }

    /// Replace the related-buffer list.
    pub fn with_related(mut self, related: Vec<MediaBuffer>) -> Self {
        self.related = Arc::from(related);
        self
    }

    /// Same handle with an empty related list.
    pub fn without_related(self) -> Self {
        self.with_related(Vec::new())
    }

    // ── Accessors ──

    /// Valid bytes of the buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.valid_size]
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn valid_size(&self) -> usize {
        self.valid_size
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn related(&self) -> &[MediaBuffer] {
        &self.related
    }

    /// Typed view of the user data, if it holds a `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.user_data.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Copy of the valid bytes, for producers that derive a modified picture.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    /// Whether two handles share the same underlying bytes.
    pub fn same_data(&self, other: &MediaBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for MediaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBuffer")
            .field("kind", &self.kind)
            .field("valid_size", &self.valid_size)
            .field("timestamp_us", &self.timestamp_us)
            .field("valid", &self.valid)
            .field("has_user_data", &self.user_data.is_some())
            .field("related", &self.related.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_related_is_shared_not_copied() {
        let big = MediaBuffer::image(vec![1; 12], PixelFormat::Rgb888, 2, 2).with_timestamp(5);
        let small = MediaBuffer::image(vec![2; 3], PixelFormat::Rgb888, 1, 1)
            .with_related(vec![big.clone()]);
        assert_eq!(small.related().len(), 1);
        assert!(small.related()[0].same_data(&big));
        assert_eq!(small.related()[0].timestamp_us(), 5);
    }

    #[test]
    fn test_builders_do_not_touch_original() {
        let a = MediaBuffer::jpeg(vec![0xFF, 0xD8]).with_timestamp(1);
        let b = a.clone().with_timestamp(2).with_validity(false);
        assert_eq!(a.timestamp_us(), 1);
        assert!(a.is_valid());
        assert_eq!(b.timestamp_us(), 2);
        assert!(!b.is_valid());
        assert!(a.same_data(&b));
    }

    #[test]
    fn test_valid_size_clamped() {
        let buf = MediaBuffer::new(vec![1, 2, 3, 4], BufferKind::Opaque).with_valid_size(10);
        assert_eq!(buf.bytes(), &[1, 2, 3, 4]);
        let buf = buf.with_valid_size(2);
        assert_eq!(buf.bytes(), &[1, 2]);
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn test_user_data_downcast() {
        let buf = MediaBuffer::with_value(42u32, BufferKind::Inference);
        assert_eq!(buf.value::<u32>(), Some(&42));
        assert!(buf.value::<u64>().is_none());
    }

    #[test]
    fn test_reserve_reports_failure() {
        assert!(reserve(16).unwrap().capacity() >= 16);
        assert!(matches!(
            reserve(usize::MAX),
            Err(crate::Error::Allocation { requested: usize::MAX })
        ));
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(PixelFormat::Nv12.frame_size(4, 4), Some(24));
        assert_eq!(PixelFormat::Rgb888.frame_size(4, 4), Some(48));
        assert_eq!(PixelFormat::Rgb565.frame_size(3, 1), Some(6));
        if usize::BITS == 64 {
            assert_eq!(PixelFormat::Rgb888.frame_size(u32::MAX, u32::MAX), None);
        }
    }
}
