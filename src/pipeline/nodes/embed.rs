//! EmbedFlow: joins each picture with its inference result and hands both
//! to the encoder that puts them on the wire.
//!
//! Slot 0 carries pictures, slot 1 the latest inference output (best
//! effort, so a slow model never holds pictures back). In render mode the
//! result rides on the picture's related list instead and slot 1 is absent.
//! Every picture gets a sideband blob; pictures without a result carry a
//! header-only blob.

use crate::buffer::{reserve, MediaBuffer};
use crate::error::{Error, Result};
use crate::pipeline::node::ProcessContext;
use crate::pipeline::slot::{InputSlot, SlotMap};
use crate::sideband::{embed, embed_with, insert_segments, InferenceOutput, SidebandHeader};
use anyhow::Context;

/// Encodes a picture with its sideband blob into an outgoing bitstream.
pub trait PictureEncoder: Send {
    fn encode(&mut self, picture: &MediaBuffer, sideband: &[u8]) -> anyhow::Result<MediaBuffer>;
}

/// Encoder for pictures that are already JPEG: splices the blob in as APP2
/// segments.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegSpliceEncoder;

impl PictureEncoder for JpegSpliceEncoder {
    fn encode(&mut self, picture: &MediaBuffer, sideband: &[u8]) -> anyhow::Result<MediaBuffer> {
        let spliced = insert_segments(picture.bytes(), sideband)
            .context("splicing sideband segments")?;
        Ok(MediaBuffer::jpeg(spliced).with_timestamp(picture.timestamp_us()))
    }
}

pub struct EmbedFlow {
    template: SidebandHeader,
    encoder: Box<dyn PictureEncoder>,
    render_mode: bool,
    reserve: fn(usize) -> Result<Vec<u8>>,
}

impl EmbedFlow {
    /// `template` provides model identifier, output type and geometry.
    pub fn new(template: SidebandHeader, encoder: impl PictureEncoder + 'static) -> Self {
        Self {
            template,
            encoder: Box::new(encoder),
            render_mode: false,
            reserve,
        }
    }

    #[cfg(test)]
    fn blob_allocator(mut self, reserve: fn(usize) -> Result<Vec<u8>>) -> Self {
        self.reserve = reserve;
        self
    }

    /// Take the result from the picture's related list instead of slot 1.
    pub fn render_mode(mut self, enabled: bool) -> Self {
        self.render_mode = enabled;
        self
    }

    pub fn slot_map(self, picture_depth: usize, result_depth: usize) -> SlotMap {
        let mut map = SlotMap::new().input(InputSlot::frames(picture_depth));
        if !self.render_mode {
            map = map.input(InputSlot::latest(result_depth));
        }
        let mut flow = self;
        map.outputs(1)
            .process(move |ctx: &mut ProcessContext<'_>| flow.run(ctx))
    }

    fn result_for(&self, ctx: &ProcessContext<'_>, picture: &MediaBuffer) -> Option<MediaBuffer> {
        let result = if self.render_mode {
            picture.related().first().cloned()
        } else {
            ctx.input(1).cloned()
        };
        result.filter(|r| r.is_valid() && r.value::<InferenceOutput>().is_some())
    }

    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(picture) = ctx.take_input(0) else {
            return false;
        };
        if !picture.is_valid() {
            return false;
        }
        let result = self.result_for(ctx, &picture);
        let output = result.as_ref().and_then(|r| r.value::<InferenceOutput>());
        let header = self.template.with_picture_timestamp(picture.timestamp_us());

        let blob = match embed_with(&header, output, self.reserve) {
            Ok(blob) => blob,
            Err(Error::Allocation { requested }) => {
                tracing::warn!("Sideband blob of {} bytes not allocated; picture dropped", requested);
                return false;
            }
            Err(e) => {
                tracing::warn!("Result not embedded, sending header only: {}", e);
                match embed(&header, None) {
                    Ok(blob) => blob,
                    Err(_) => return false,
                }
            }
        };

        match self.encoder.encode(&picture, &blob) {
            Ok(encoded) => ctx.set_output(0, encoded.with_timestamp(picture.timestamp_us())),
            Err(e) => {
                tracing::warn!("Encoding picture {} failed: {:#}", picture.timestamp_us(), e);
                false
            }
        }
    }
}
