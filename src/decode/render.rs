//! Drawing decoded results.
//!
//! Draw functions take a [`DrawRequest`] describing where the picture is
//! shown and paint onto a [`Canvas`]. Result coordinates are first scaled
//! from the NPU input geometry into the draw rectangle, then rotated about
//! the centre of the reference rectangle.

use super::records::{parse_records, FaceGenderAge, FaceRect};
use super::{DecodedPayload, DecodedResult};
use crate::buffer::PixelFormat;
use crate::types::{Rect, Rotation};

/// Minimum score for a face-detect box to be drawn.
pub const FACE_DETECT_THRESHOLD: f32 = 0.8;
/// Minimum score for a gender/age box to be drawn.
pub const FACE_GENDER_AGE_THRESHOLD: f32 = 0.85;

/// Distance between a box and its label.
const LABEL_OFFSET: i32 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Colour of result boxes.
pub const OVERLAY_COLOR: Color = Color::rgb(0xFF, 0x10, 0xEB);

/// Drawing surface for result overlays.
#[cfg_attr(test, mockall::automock)]
pub trait Canvas {
    /// Outline `rect`. Returns `false` if nothing was drawn.
    fn draw_rect(&mut self, rect: Rect, color: Color) -> bool;

    /// Draw a text label anchored at `origin`, rotated with the picture.
    fn draw_text(&mut self, text: &str, origin: (i32, i32), rotation: Rotation, color: Color);
}

/// Where and how a result is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRequest {
    /// Rectangle the picture occupies on the canvas.
    pub draw_rect: Rect,
    /// Rectangle whose centre is the rotation pivot.
    pub coord_rect: Rect,
    pub rotation: Rotation,
}

impl DrawRequest {
    /// Unrotated request where the picture fills `rect`.
    pub fn full(rect: Rect) -> Self {
        Self {
            draw_rect: rect,
            coord_rect: rect,
            rotation: Rotation::Deg0,
        }
    }

    /// Map a rectangle from NPU space onto the canvas.
    ///
    /// `None` when the mapped box does not fit canvas coordinates.
    pub fn map(&self, rect: Rect, npu: crate::types::Geometry) -> Option<Rect> {
        self.draw_rect
            .scale_from(rect, npu)?
            .rotate_about(self.coord_rect, self.rotation)
    }
}

/// Draw function selected per model when a result is decoded.
/// Returns the number of boxes drawn.
pub type DrawFn = fn(&DecodedResult, &mut dyn Canvas, &DrawRequest) -> usize;

fn label_origin(rect: Rect, rotation: Rotation) -> (i32, i32) {
    match rotation {
        Rotation::Deg0 => (rect.x, rect.y.saturating_sub(LABEL_OFFSET)),
        Rotation::Deg90 => (rect.x.saturating_add(rect.w), rect.y.saturating_add(rect.h / 2)),
        Rotation::Deg180 => (rect.x, rect.y.saturating_add(rect.h)),
        Rotation::Deg270 => (rect.x.saturating_sub(LABEL_OFFSET), rect.y.saturating_add(rect.h / 2)),
    }
}

fn record_bytes(result: &DecodedResult) -> &[u8] {
    match result.payload() {
        DecodedPayload::Records(bytes) => bytes,
        DecodedPayload::Detections(_) => &[],
    }
}

pub fn draw_face_detect(result: &DecodedResult, canvas: &mut dyn Canvas, req: &DrawRequest) -> usize {
    let faces: Vec<FaceRect> = match parse_records(record_bytes(result), result.count()) {
        Ok(faces) => faces,
        Err(e) => {
            tracing::warn!("Dropping face-detect overlay: {}", e);
            return 0;
        }
    };
    let mut drawn = 0;
    for face in faces.iter().filter(|f| f.score >= FACE_DETECT_THRESHOLD) {
        let Some(rect) = req.map(face.rect(), result.geometry()) else {
            tracing::debug!("Face box {} does not map onto the canvas", face.rect());
            continue;
        };
        if canvas.draw_rect(rect, OVERLAY_COLOR) {
            drawn += 1;
        } else {
            tracing::debug!("Face box {} outside the canvas", rect);
        }
    }
    drawn
}

pub fn draw_face_gender_age(
    result: &DecodedResult,
    canvas: &mut dyn Canvas,
    req: &DrawRequest,
) -> usize {
    let faces: Vec<FaceGenderAge> = match parse_records(record_bytes(result), result.count()) {
        Ok(faces) => faces,
        Err(e) => {
            tracing::warn!("Dropping gender/age overlay: {}", e);
            return 0;
        }
    };
    let mut drawn = 0;
    for face in faces
        .iter()
        .filter(|f| f.face.score >= FACE_GENDER_AGE_THRESHOLD)
    {
        let Some(rect) = req.map(face.face.rect(), result.geometry()) else {
            tracing::debug!("Face box {} does not map onto the canvas", face.face.rect());
            continue;
        };
        if canvas.draw_rect(rect, OVERLAY_COLOR) {
            drawn += 1;
        }
        canvas.draw_text(&face.label(), label_origin(rect, req.rotation), req.rotation, OVERLAY_COLOR);
    }
    drawn
}

/// Draw function for tensor models: every detection the post-processor kept.
pub fn draw_detections(result: &DecodedResult, canvas: &mut dyn Canvas, req: &DrawRequest) -> usize {
    let DecodedPayload::Detections(set) = result.payload() else {
        return 0;
    };
    let mut drawn = 0;
    for det in &set.detections {
        let Some(rect) = req.map(det.rect, result.geometry()) else {
            tracing::debug!("Detection {} does not map onto the canvas", det.rect);
            continue;
        };
        if canvas.draw_rect(rect, OVERLAY_COLOR) {
            drawn += 1;
        }
        if !det.label.is_empty() {
            let text = format!("{} {:.2}", det.label, det.score);
            canvas.draw_text(&text, label_origin(rect, req.rotation), req.rotation, OVERLAY_COLOR);
        }
    }
    drawn
}

// ── Canvases ──

/// Canvas painting box outlines straight into a packed RGB24 frame.
///
/// Text needs a font renderer and is not drawn.
pub struct Rgb24Canvas {
    width: i32,
    height: i32,
    pixels: Vec<u8>,
}

impl Rgb24Canvas {
    /// Wrap a frame of `width * height * 3` bytes. Returns `None` when the
    /// buffer is too small or the dimensions exceed `i32`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let needed = PixelFormat::Rgb888.frame_size(width, height)?;
        if pixels.len() < needed {
            return None;
        }
        Some(Self {
            width: i32::try_from(width).ok()?,
            height: i32::try_from(height).ok()?,
            pixels,
        })
    }

    pub fn viewport(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 3;
        Some(Color::rgb(
            self.pixels[at],
            self.pixels[at + 1],
            self.pixels[at + 2],
        ))
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    fn put(&mut self, x: i32, y: i32, color: Color) {
        let at = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[at..at + 3].copy_from_slice(&[color.r, color.g, color.b]);
    }
}

impl Canvas for Rgb24Canvas {
    fn draw_rect(&mut self, rect: Rect, color: Color) -> bool {
        // The whole outline, including the far edges, must be on the canvas.
        if rect.x < 0
            || rect.y < 0
            || rect.w < 0
            || rect.h < 0
            || rect.right() >= self.width as i64
            || rect.bottom() >= self.height as i64
        {
            return false;
        }
        // In bounds, so the far edges fit an i32.
        let (x0, y0, x1, y1) = (rect.x, rect.y, rect.x + rect.w, rect.y + rect.h);
        for x in x0..=x1 {
            self.put(x, y0, color);
            self.put(x, y1, color);
        }
        for y in y0..=y1 {
            self.put(x0, y, color);
            self.put(x1, y, color);
        }
        true
    }

    fn draw_text(&mut self, text: &str, origin: (i32, i32), _rotation: Rotation, _color: Color) {
        tracing::trace!("RGB24 canvas skips label {:?} at {:?}", text, origin);
    }
}

/// One recorded drawing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    Rect { rect: Rect, color: Color },
    Text { text: String, origin: (i32, i32) },
}

/// Canvas that records operations instead of painting, clipped to `bounds`.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    pub bounds: Option<Rect>,
    pub ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bounds(bounds: Rect) -> Self {
        Self {
            bounds: Some(bounds),
            ops: Vec::new(),
        }
    }

    pub fn rects(&self) -> Vec<Rect> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect { rect, .. } => Some(*rect),
                DrawOp::Text { .. } => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                DrawOp::Rect { .. } => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn draw_rect(&mut self, rect: Rect, color: Color) -> bool {
        if let Some(b) = self.bounds {
            if rect.x < b.x || rect.y < b.y || rect.right() > b.right() || rect.bottom() > b.bottom() {
                return false;
            }
        }
        self.ops.push(DrawOp::Rect { rect, color });
        true
    }

    fn draw_text(&mut self, text: &str, origin: (i32, i32), _rotation: Rotation, _color: Color) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            origin,
        });
    }
}
