//! Node processing abstraction.
//!
//! Node behaviour is data, not a type hierarchy: every node is a uniform
//! record (slot map + worker) that owns one [`Process`] value. Closures are
//! processes too, so small nodes can be written inline while larger ones keep
//! their state in a struct that implements the trait.

use crate::buffer::MediaBuffer;
use crate::pipeline::id::NodeId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Per-invocation view handed to a process function.
pub struct ProcessContext<'a> {
    node: NodeId,
    name: &'a str,
    inputs: Vec<Option<MediaBuffer>>,
    outputs: Vec<(usize, MediaBuffer)>,
    output_count: usize,
    stopping: &'a AtomicBool,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        name: &'a str,
        inputs: Vec<Option<MediaBuffer>>,
        output_count: usize,
        stopping: &'a AtomicBool,
    ) -> Self {
        Self {
            node,
            name,
            inputs,
            outputs: Vec::new(),
            output_count,
            stopping,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Number of input slots. Each entry may be `None` for best-effort slots.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input(&self, slot: usize) -> Option<&MediaBuffer> {
        self.inputs.get(slot).and_then(Option::as_ref)
    }

    /// Move an input out of the context.
    pub fn take_input(&mut self, slot: usize) -> Option<MediaBuffer> {
        self.inputs.get_mut(slot).and_then(Option::take)
    }

    /// Queue `buffer` for every edge leaving `slot`.
    ///
    /// Outputs are delivered after the process function returns, and only if
    /// it returns `true`. Returns `false` for an unknown slot.
    pub fn set_output(&mut self, slot: usize, buffer: MediaBuffer) -> bool {
        if slot >= self.output_count {
            tracing::warn!(
                "Node '{}' wrote to output slot {} but has only {}",
                self.name,
                slot,
                self.output_count
            );
            return false;
        }
        self.outputs.push((slot, buffer));
        true
    }

    /// Whether the node has been asked to stop. Long-running process
    /// functions should poll this and return early.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn into_parts(self) -> (Vec<Option<MediaBuffer>>, Vec<(usize, MediaBuffer)>) {
        (self.inputs, self.outputs)
    }
}

/// A node's processing function.
///
/// Returns `true` on success. `false` means "no output this cycle"; it is
/// not retried and the worker simply waits for the next trigger.
pub trait Process: Send {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool;
}

impl<F> Process for F
where
    F: FnMut(&mut ProcessContext<'_>) -> bool + Send,
{
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> bool {
        self(ctx)
    }
}

/// Counters maintained by a node's worker and queues.
#[derive(Debug, Default)]
pub struct NodeCounters {
    pub(crate) processed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) panicked: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) delivered: AtomicU64,
}

impl NodeCounters {
    pub fn snapshot(&self) -> NodeStats {
        NodeStats {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Invocations that returned `true`.
    pub processed: u64,
    /// Invocations that returned `false` (includes panics).
    pub failed: u64,
    /// Invocations that panicked.
    pub panicked: u64,
    /// Buffers discarded from this node's inputs (drop-oldest or stop).
    pub dropped: u64,
    /// Buffers this node pushed into downstream edges.
    pub delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferKind;

    #[test]
    fn test_context_outputs_bounded_by_slot_count() {
        let stop = AtomicBool::new(false);
        let mut ctx = ProcessContext::new(NodeId(0), "n", vec![None], 1, &stop);
        assert!(ctx.set_output(0, MediaBuffer::new(vec![1], BufferKind::Opaque)));
        assert!(!ctx.set_output(1, MediaBuffer::new(vec![2], BufferKind::Opaque)));
        let (_, outputs) = ctx.into_parts();
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_take_input() {
        let stop = AtomicBool::new(true);
        let buf = MediaBuffer::new(vec![9], BufferKind::Opaque);
        let mut ctx = ProcessContext::new(NodeId(3), "n", vec![Some(buf), None], 0, &stop);
        assert!(ctx.is_stopping());
        assert_eq!(ctx.input_count(), 2);
        assert!(ctx.input(1).is_none());
        assert!(ctx.take_input(0).is_some());
        assert!(ctx.input(0).is_none());
    }

    #[test]
    fn test_closure_is_process() {
        let mut calls = 0;
        let mut f = |_: &mut ProcessContext<'_>| {
            calls += 1;
            true
        };
        let stop = AtomicBool::new(false);
        let mut ctx = ProcessContext::new(NodeId(0), "n", vec![], 0, &stop);
        assert!(Process::process(&mut f, &mut ctx));
        drop(f);
        assert_eq!(calls, 1);
    }
}
