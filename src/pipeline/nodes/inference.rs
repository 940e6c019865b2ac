//! InferenceFlow: runs the NPU model on each picture.
//!
//! The model itself is an [`InferenceEngine`] collaborator. The flow stamps
//! the result with the picture's timestamp and, when configured to hold the
//! picture, links the full-resolution picture as the output's related buffer
//! so a later stage can draw on it.

use crate::buffer::{BufferKind, MediaBuffer};
use crate::pipeline::node::ProcessContext;
use crate::pipeline::slot::{HoldInput, InputSlot, SlotMap};
use crate::sideband::{InferenceOutput, InferencePayload};

/// The NPU model. Returns `None` when it ran but produced nothing to report.
pub trait InferenceEngine: Send {
    fn infer(&mut self, picture: &MediaBuffer) -> anyhow::Result<Option<InferencePayload>>;
}

impl<F> InferenceEngine for F
where
    F: FnMut(&MediaBuffer) -> anyhow::Result<Option<InferencePayload>> + Send,
{
    fn infer(&mut self, picture: &MediaBuffer) -> anyhow::Result<Option<InferencePayload>> {
        self(picture)
    }
}

pub struct InferenceFlow {
    engine: Box<dyn InferenceEngine>,
    hold_picture: bool,
}

impl InferenceFlow {
    pub fn new(engine: impl InferenceEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            hold_picture: false,
        }
    }

    /// Attach the input picture to every result (render mode).
    pub fn hold_picture(mut self, hold: bool) -> Self {
        self.hold_picture = hold;
        self
    }

    /// One drop-oldest picture input, one result output.
    pub fn slot_map(self, depth: usize) -> SlotMap {
        let hold = if self.hold_picture {
            HoldInput::Hold
        } else {
            HoldInput::None
        };
        let mut flow = self;
        SlotMap::new()
            .input(InputSlot::frames(depth))
            .outputs(1)
            .hold_input(0, hold)
            .process(move |ctx: &mut ProcessContext<'_>| flow.run(ctx))
    }

    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        let Some(picture) = ctx.input(0).cloned() else {
            return false;
        };
        if !picture.is_valid() {
            return false;
        }
        let payload = match self.engine.infer(&picture) {
            Ok(Some(payload)) => payload,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Inference on '{}' failed: {:#}", ctx.name(), e);
                return false;
            }
        };
        let output = InferenceOutput {
            timestamp_us: picture.timestamp_us(),
            payload,
        };
        let buffer = MediaBuffer::with_value(output, BufferKind::Inference)
            .with_timestamp(picture.timestamp_us());
        ctx.set_output(0, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ChannelSink, Graph};
    use std::time::{Duration, Instant};

    fn face_engine(picture: &MediaBuffer) -> anyhow::Result<Option<InferencePayload>> {
        if picture.bytes().is_empty() {
            anyhow::bail!("empty picture");
        }
        Ok(Some(InferencePayload::Records {
            count: 0,
            bytes: Vec::new(),
        }))
    }

    #[test]
    fn test_result_carries_picture_timestamp_and_link() {
        let graph = Graph::new();
        let infer = graph
            .install(
                "infer",
                InferenceFlow::new(face_engine).hold_picture(true).slot_map(2),
            )
            .unwrap();
        let (sink, rx) = ChannelSink::new(false);
        let out = graph
            .install("out", sink.slot_map(&[InputSlot::lossless(4)]))
            .unwrap();
        graph.connect(infer, 0, out, 0).unwrap();

        let picture = MediaBuffer::jpeg(vec![1, 2, 3]).with_timestamp(77);
        graph.send(infer, 0, picture.clone()).unwrap();
        graph.send(infer, 0, MediaBuffer::jpeg(Vec::new())).unwrap();

        let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let result = msg.first().unwrap();
        assert_eq!(result.timestamp_us(), 77);
        assert_eq!(result.value::<InferenceOutput>().unwrap().timestamp_us, 77);
        assert!(result.related()[0].same_data(&picture));

        let deadline = Instant::now() + Duration::from_secs(2);
        while graph.stats(infer).unwrap().failed == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(graph.stats(infer).unwrap().failed, 1);
        graph.shutdown();
    }
}
