//! ComposeFlow: shows pictures on the host with their results drawn on top.
//!
//! Slot 0 receives pictures, slot 1 decoded results (best effort). The
//! picture is letterboxed into the sink's bounds, honouring the display
//! rotation. A picture that arrives without a result reuses the previous
//! one if it is recent enough (see [`ReuseWindow`]).

use crate::buffer::{BufferKind, MediaBuffer};
use crate::decode::{Canvas, DecodedResult, DrawRequest, RecordingCanvas, ReuseWindow};
use crate::pipeline::node::ProcessContext;
use crate::pipeline::slot::{InputSlot, SlotMap};
use crate::types::{Geometry, Rect, Rotation};
use std::sync::{Arc, Mutex, PoisonError};

/// Where composed frames end up: a window, a video overlay, a file.
pub trait RenderSink: Send {
    /// Drawable area.
    fn bounds(&self) -> Rect;

    /// Draw `picture` into `dst`, rotated by `rotation`.
    fn draw_picture(&mut self, picture: &MediaBuffer, dst: Rect, rotation: Rotation) -> anyhow::Result<()>;

    /// Canvas for result overlays on the current frame.
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// Finish the current frame.
    fn present(&mut self) -> anyhow::Result<()>;
}

/// Fit a `src` sized picture into `bounds`, keeping its aspect ratio and
/// centring it. For 90°/270° the picture is fitted into the transposed
/// bounds, centred on the same point. Fitted sizes are rounded down to even.
pub fn letterbox(src: Geometry, bounds: Rect, rotation: Rotation) -> Rect {
    let mut dst = bounds;
    if rotation.is_transposed() {
        dst.x += (bounds.w - bounds.h) / 2;
        dst.y += (bounds.h - bounds.w) / 2;
        std::mem::swap(&mut dst.w, &mut dst.h);
    }
    if !src.is_valid() {
        return dst;
    }
    let (sw, sh) = (src.width as i64, src.height as i64);
    let (dw, dh) = (dst.w as i64, dst.h as i64);
    if sw * dh > sh * dw {
        let h = ((dw * sh / sw) as i32) & !1;
        dst.y += (dst.h - h) / 2;
        dst.h = h;
    } else {
        let w = ((dh * sw / sh) as i32) & !1;
        dst.x += (dst.w - w) / 2;
        dst.w = w;
    }
    dst
}

pub struct ComposeFlow {
    sink: Box<dyn RenderSink>,
    rotation: Rotation,
    reuse: ReuseWindow,
}

impl ComposeFlow {
    pub fn new(sink: impl RenderSink + 'static, rotation: Rotation) -> Self {
        Self {
            sink: Box::new(sink),
            rotation,
            reuse: ReuseWindow::default(),
        }
    }

    pub fn reuse_window_ms(mut self, window_ms: u64) -> Self {
        self.reuse = ReuseWindow::new(window_ms);
        self
    }

    pub fn slot_map(self, picture_depth: usize, result_depth: usize) -> SlotMap {
        let mut flow = self;
        SlotMap::new()
            .input(InputSlot::frames(picture_depth))
            .input(InputSlot::latest(result_depth))
            .process(move |ctx: &mut ProcessContext<'_>| flow.run(ctx))
    }

    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(picture) = ctx.take_input(0) else {
            return false;
        };
        let fresh = ctx
            .take_input(1)
            .filter(|r| r.is_valid() && r.value::<DecodedResult>().is_some());

        let bounds = self.sink.bounds();
        let src = match picture.kind() {
            BufferKind::Image { width, height, .. } => Geometry::new(width, height),
            // Compressed pictures fill the display.
            _ => Geometry::new(bounds.w.max(0) as u32, bounds.h.max(0) as u32),
        };
        let dst = letterbox(src, bounds, self.rotation);
        if let Err(e) = self.sink.draw_picture(&picture, dst, self.rotation) {
            tracing::warn!("Drawing picture {} failed: {:#}", picture.timestamp_us(), e);
            return false;
        }

        if let Some(result) = self.reuse.select(picture.timestamp_us(), fresh) {
            if let Some(decoded) = result.value::<DecodedResult>() {
                let request = DrawRequest {
                    draw_rect: dst,
                    coord_rect: bounds,
                    rotation: self.rotation,
                };
                let drawn = decoded.draw(self.sink.canvas(), &request);
                tracing::trace!("Picture {}: {} boxes", picture.timestamp_us(), drawn);
            }
        }

        if let Err(e) = self.sink.present() {
            tracing::warn!("Presenting picture {} failed: {:#}", picture.timestamp_us(), e);
            return false;
        }
        true
    }
}

// ── Recording sink ──

/// What a [`RecordingRenderSink`] saw for one presented frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedFrame {
    pub timestamp_us: u64,
    pub picture_rect: Rect,
    pub boxes: Vec<Rect>,
    pub labels: Vec<String>,
}

/// Render sink that records frames instead of showing them. Frames are
/// shared through [`RecordingRenderSink::frames`], which stays valid after
/// the sink has been moved into a graph.
pub struct RecordingRenderSink {
    bounds: Rect,
    canvas: RecordingCanvas,
    current: Option<(u64, Rect)>,
    frames: Arc<Mutex<Vec<ComposedFrame>>>,
}

impl RecordingRenderSink {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            canvas: RecordingCanvas::with_bounds(bounds),
            current: None,
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn frames(&self) -> Arc<Mutex<Vec<ComposedFrame>>> {
        Arc::clone(&self.frames)
    }
}

impl RenderSink for RecordingRenderSink {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn draw_picture(&mut self, picture: &MediaBuffer, dst: Rect, _rotation: Rotation) -> anyhow::Result<()> {
        self.canvas.clear();
        self.current = Some((picture.timestamp_us(), dst));
        Ok(())
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn present(&mut self) -> anyhow::Result<()> {
        let (timestamp_us, picture_rect) = self
            .current
            .take()
            .ok_or_else(|| anyhow::anyhow!("present without a picture"))?;
        let frame = ComposedFrame {
            timestamp_us,
            picture_rect,
            boxes: self.canvas.rects(),
            labels: self.canvas.texts().into_iter().map(str::to_string).collect(),
        };
        tracing::debug!(
            "Frame {} at {} with {} boxes",
            frame.timestamp_us,
            frame.picture_rect,
            frame.boxes.len()
        );
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
        Ok(())
    }
}
