//! ExtractFlow: host-side entry point for received JPEG pictures.
//!
//! Scans each bitstream for sideband data, decodes the picture through a
//! [`PictureDecoder`] collaborator and decodes the result through the
//! [`ModelRegistry`]. The picture always leaves on slot 0, even when the
//! metadata is missing, corrupt or from an unknown model. A decoded result
//! leaves on slot 1, ahead of its picture, so a downstream node triggered by
//! the picture already finds the result queued.

use crate::buffer::{BufferKind, MediaBuffer};
use crate::decode::ModelRegistry;
use crate::error::Error;
use crate::pipeline::node::ProcessContext;
use crate::pipeline::slot::{InputSlot, SlotMap};
use crate::sideband::extract;
use std::sync::Arc;

/// Turns a received bitstream into a displayable picture.
pub trait PictureDecoder: Send {
    fn decode(&mut self, bitstream: &MediaBuffer) -> anyhow::Result<MediaBuffer>;
}

/// Decoder for sinks that consume JPEG directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegPassthrough;

impl PictureDecoder for JpegPassthrough {
    fn decode(&mut self, bitstream: &MediaBuffer) -> anyhow::Result<MediaBuffer> {
        Ok(bitstream.clone().without_related())
    }
}

pub struct ExtractFlow {
    registry: Arc<ModelRegistry>,
    decoder: Box<dyn PictureDecoder>,
}

impl ExtractFlow {
    pub fn new(registry: Arc<ModelRegistry>, decoder: impl PictureDecoder + 'static) -> Self {
        Self {
            registry,
            decoder: Box::new(decoder),
        }
    }

    /// JPEG input on slot 0; picture and result outputs on slots 0 and 1.
    pub fn slot_map(self, depth: usize) -> SlotMap {
        let mut flow = self;
        SlotMap::new()
            .input(InputSlot::frames(depth))
            .outputs(2)
            .process(move |ctx: &mut ProcessContext<'_>| flow.run(ctx))
    }

    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(bitstream) = ctx.take_input(0) else {
            return false;
        };
        if !bitstream.is_valid() {
            return false;
        }

        let meta = match extract(bitstream.bytes()) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("{}; picture {} shown without overlay", Error::from(e), bitstream.timestamp_us());
                None
            }
        };

        let picture = match self.decoder.decode(&bitstream) {
            Ok(picture) => picture,
            Err(e) => {
                tracing::warn!("Decoding picture {} failed: {:#}", bitstream.timestamp_us(), e);
                return false;
            }
        };
        let picture_ts = meta
            .as_ref()
            .map_or(bitstream.timestamp_us(), |m| m.header.picture_timestamp);

        if let Some(meta) = meta {
            match self.registry.decode(&meta) {
                Ok(Some(result)) => {
                    let ts = result.timestamp_us();
                    let buffer =
                        MediaBuffer::with_value(result, BufferKind::Inference).with_timestamp(ts);
                    ctx.set_output(1, buffer);
                }
                Ok(None) => {}
                Err(e) if e.is_metadata_local() => {
                    tracing::warn!("Sideband data of picture {} dropped: {}", picture_ts, e);
                }
                Err(e) => {
                    tracing::error!("Decoding sideband data of picture {} failed: {}", picture_ts, e);
                }
            }
        }

        ctx.set_output(0, picture.with_timestamp(picture_ts))
    }
}
