//! Core geometry types shared by the sideband codec, the decoders and the
//! render flows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width/height pair of the NPU input the inference results refer to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Integer rectangle in pixel space (origin top-left, y grows downwards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle from two corners (`left, top` inclusive, `right, bottom` exclusive).
    ///
    /// Extents that do not fit an `i32` saturate.
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            w: right.saturating_sub(left),
            h: bottom.saturating_sub(top),
        }
    }

    /// Narrow a rectangle computed in `i64`. `None` if any field overflows `i32`.
    fn from_wide(x: i64, y: i64, w: i64, h: i64) -> Option<Rect> {
        Some(Rect {
            x: i32::try_from(x).ok()?,
            y: i32::try_from(y).ok()?,
            w: i32::try_from(w).ok()?,
            h: i32::try_from(h).ok()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Map a rectangle expressed in `from` space linearly into this rectangle.
    ///
    /// Returns `None` when the result cannot be represented.
    pub fn scale_from(&self, src: Rect, from: Geometry) -> Option<Rect> {
        let fw = from.width.max(1) as i64;
        let fh = from.height.max(1) as i64;
        Rect::from_wide(
            src.x as i64 * self.w as i64 / fw + self.x as i64,
            src.y as i64 * self.h as i64 / fh + self.y as i64,
            src.w as i64 * self.w as i64 / fw,
            src.h as i64 * self.h as i64 / fh,
        )
    }

    /// Rotate clockwise about the centre of `reference`.
    ///
    /// Returns `None` when the result cannot be represented.
    pub fn rotate_about(&self, reference: Rect, rotation: Rotation) -> Option<Rect> {
        let cx = reference.x as i64 + reference.w as i64 / 2;
        let cy = reference.y as i64 + reference.h as i64 / 2;
        let (x, y, w, h) = (self.x as i64, self.y as i64, self.w as i64, self.h as i64);
        match rotation {
            Rotation::Deg0 => Some(*self),
            Rotation::Deg90 => Rect::from_wide(cx + cy - y - h, x - cx + cy, h, w),
            Rotation::Deg180 => Rect::from_wide(2 * cx - x - w, 2 * cy - y - h, w, h),
            Rotation::Deg270 => Rect::from_wide(y - cy + cx, cx + cy - x - w, h, w),
        }
    }

    /// Right edge, computed without overflow.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.w as i64
    }

    /// Bottom edge, computed without overflow.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.h as i64
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.w, self.h)
    }
}

/// Display rotation, restricted to right angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> std::result::Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0/90/180/270, got {}", other)),
        }
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
