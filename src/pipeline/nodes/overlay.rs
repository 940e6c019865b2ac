//! OverlayFlow: paints inference results onto the full-resolution picture
//! on the device, before encoding.
//!
//! Input is an inference buffer whose first related buffer is the picture it
//! was computed from (see [`InferenceFlow::hold_picture`]). The output is the
//! painted picture, with the inference buffer as its only related buffer so
//! the embed stage still sends the result.
//!
//! [`InferenceFlow::hold_picture`]: super::InferenceFlow::hold_picture

use crate::buffer::{reserve, BufferKind, MediaBuffer, PixelFormat};
use crate::decode::{DecodedResult, DrawRequest, ModelRegistry, Rgb24Canvas};
use crate::error::Result;
use crate::pipeline::node::ProcessContext;
use crate::pipeline::slot::{InputSlot, SlotMap, ThreadModel};
use crate::sideband::{embed, ExtractedMetadata, InferenceOutput, SidebandHeader};
use std::sync::Arc;

pub struct OverlayFlow {
    registry: Arc<ModelRegistry>,
    template: SidebandHeader,
}

impl OverlayFlow {
    pub fn new(registry: Arc<ModelRegistry>, template: SidebandHeader) -> Self {
        Self { registry, template }
    }

    pub fn slot_map(self) -> SlotMap {
        let flow = self;
        SlotMap::new()
            .input(InputSlot::frames(1))
            .outputs(1)
            .thread_model(ThreadModel::Atomic)
            .process(move |ctx: &mut ProcessContext<'_>| flow.run(ctx))
    }

    fn run(&self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(result) = ctx.take_input(0) else {
            return false;
        };
        let Some(picture) = result.related().first().cloned() else {
            tracing::debug!("Inference buffer without a picture, nothing to paint");
            return false;
        };
        let inference = result.without_related();
        let painted = if inference.is_valid() {
            self.paint(&picture, &inference)
        } else {
            None
        };
        let out = painted.unwrap_or(picture).with_related(vec![inference]);
        ctx.set_output(0, out)
    }

    /// Decode the result the way the host would and draw it into a copy of
    /// the picture.
    fn decode(&self, picture: &MediaBuffer, output: &InferenceOutput) -> Result<Option<DecodedResult>> {
        let header = self.template.with_picture_timestamp(picture.timestamp_us());
        let meta = ExtractedMetadata::from_blob(embed(&header, Some(output))?)?;
        self.registry.decode(&meta)
    }

    fn paint(&self, picture: &MediaBuffer, inference: &MediaBuffer) -> Option<MediaBuffer> {
        let output = inference.value::<InferenceOutput>()?;
        let BufferKind::Image {
            format: PixelFormat::Rgb888,
            width,
            height,
        } = picture.kind()
        else {
            tracing::debug!("Overlay only paints RGB888 pictures, got {:?}", picture.kind());
            return None;
        };
        let decoded = match self.decode(picture, output) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Result not drawn: {}", e);
                return None;
            }
        };
        let mut pixels = match reserve(picture.valid_size()) {
            Ok(pixels) => pixels,
            Err(e) => {
                tracing::warn!("Picture {} not painted: {}", picture.timestamp_us(), e);
                return None;
            }
        };
        pixels.extend_from_slice(picture.bytes());
        let mut canvas = Rgb24Canvas::new(width, height, pixels)?;
        let request = DrawRequest::full(canvas.viewport());
        let drawn = decoded.draw(&mut canvas, &request);
        if drawn == 0 {
            return None;
        }
        tracing::trace!("Painted {} boxes on picture {}", drawn, picture.timestamp_us());
        Some(
            MediaBuffer::image(canvas.into_pixels(), PixelFormat::Rgb888, width, height)
                .with_timestamp(picture.timestamp_us()),
        )
    }
}
