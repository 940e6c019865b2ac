//! Thread boundary between the graph and code that lives outside it.
//!
//! A `ChannelSink` is a terminal node whose process function forwards every
//! triggered input into a bounded crossbeam channel. Consumers (the host
//! binary, integration tests) read buffers from the returned receiver.

use crate::buffer::MediaBuffer;
use crate::pipeline::node::ProcessContext;
use crate::pipeline::slot::{InputSlot, SlotMap};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// Channel capacity for buffers leaving the graph.
const SINK_CHANNEL_CAPACITY: usize = 64;

/// How often a blocked sink re-checks for a stop request.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One triggered cycle of a sink node.
#[derive(Debug, Clone)]
pub struct SinkMessage {
    /// Inputs in slot order; `None` for empty best-effort slots.
    pub inputs: Vec<Option<MediaBuffer>>,
}

impl SinkMessage {
    /// First non-empty input.
    pub fn first(&self) -> Option<&MediaBuffer> {
        self.inputs.iter().flatten().next()
    }
}

/// Graph-side half of a sink: a process function that forwards inputs.
pub struct ChannelSink {
    tx: Sender<SinkMessage>,
    lossy: bool,
}

impl ChannelSink {
    /// Create a sink and its receiver.
    ///
    /// A lossy sink drops messages when the consumer falls behind; otherwise
    /// the node's worker blocks until the consumer catches up or the node is
    /// stopped, in which case the pending message is dropped.
    pub fn new(lossy: bool) -> (Self, Receiver<SinkMessage>) {
        Self::with_capacity(SINK_CHANNEL_CAPACITY, lossy)
    }

    pub fn with_capacity(capacity: usize, lossy: bool) -> (Self, Receiver<SinkMessage>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx, lossy }, rx)
    }

    /// Slot map for a sink with the given inputs.
    pub fn slot_map(self, inputs: &[InputSlot]) -> SlotMap {
        inputs
            .iter()
            .fold(SlotMap::new(), |map, slot| map.input(*slot))
            .process(move |ctx: &mut ProcessContext<'_>| self.forward(ctx))
    }

    fn forward(&self, ctx: &mut ProcessContext<'_>) -> bool {
        let inputs = (0..ctx.input_count()).map(|i| ctx.take_input(i)).collect();
        let msg = SinkMessage { inputs };
        if self.lossy {
            match self.tx.try_send(msg) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!("Sink '{}' consumer behind, message dropped", ctx.name());
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        } else {
            let mut msg = msg;
            loop {
                match self.tx.send_timeout(msg, STOP_POLL_INTERVAL) {
                    Ok(()) => return true,
                    Err(SendTimeoutError::Timeout(pending)) => {
                        if ctx.is_stopping() {
                            tracing::debug!("Sink '{}' stopped with a message pending", ctx.name());
                            return false;
                        }
                        msg = pending;
                    }
                    Err(SendTimeoutError::Disconnected(_)) => return false,
                }
            }
        }
    }
}
