//! Slot maps: the per-node description of input queues, outputs, scheduling
//! model and hold-input behaviour.
//!
//! A `SlotMap` is handed to [`Graph::install`](crate::pipeline::Graph::install)
//! together with the node's process function. It is validated once, at
//! install time; a map that does not validate never gets a worker.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::Process;

/// What happens when a buffer arrives at a full input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullPolicy {
    /// Discard the oldest queued buffer and append the new one.
    #[default]
    DropOldest,
    /// Suspend the producer until space frees or the node stops.
    BlockProducer,
}

/// Whether the worker waits for this input before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// The slot must hold data before the node is triggered.
    #[default]
    Blocking,
    /// Take whatever is queued at trigger time, or `None`.
    BestEffort,
}

/// Scheduling model of a node. Both run one dedicated worker per node and
/// never overlap invocations of the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadModel {
    /// General purpose worker (decoders, inference, muxers).
    #[default]
    Shared,
    /// Short deterministic steps such as a render pass.
    Atomic,
}

impl ThreadModel {
    pub(crate) fn thread_prefix(self) -> &'static str {
        match self {
            ThreadModel::Shared => "flow",
            ThreadModel::Atomic => "flow-atomic",
        }
    }
}

/// How an output buffer is tied back to the node's input on slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldInput {
    #[default]
    None,
    /// The input buffer itself becomes the output's only related buffer.
    Hold,
    /// The output inherits the input's related-buffer list.
    InheritFromInput,
}

/// Configuration of a single input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    pub max_depth: usize,
    pub when_full: FullPolicy,
    pub fetch: FetchMode,
}

impl InputSlot {
    pub const fn new(max_depth: usize, when_full: FullPolicy, fetch: FetchMode) -> Self {
        Self {
            max_depth,
            when_full,
            fetch,
        }
    }

    /// Bounded, drop-oldest, blocking fetch: the usual video input.
    pub const fn frames(max_depth: usize) -> Self {
        Self::new(max_depth, FullPolicy::DropOldest, FetchMode::Blocking)
    }

    /// Drop-oldest input that never holds the node back.
    pub const fn latest(max_depth: usize) -> Self {
        Self::new(max_depth, FullPolicy::DropOldest, FetchMode::BestEffort)
    }

    /// Lossless control input: producers wait for space.
    pub const fn lossless(max_depth: usize) -> Self {
        Self::new(max_depth, FullPolicy::BlockProducer, FetchMode::Blocking)
    }
}

/// Full description of a node handed to `Graph::install`.
pub struct SlotMap {
    pub inputs: Vec<InputSlot>,
    pub outputs: usize,
    pub thread_model: ThreadModel,
    /// Per output slot; missing entries mean `HoldInput::None`.
    pub hold_input: Vec<HoldInput>,
    pub process: Option<Box<dyn Process>>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: 0,
            thread_model: ThreadModel::Shared,
            hold_input: Vec::new(),
            process: None,
        }
    }

    pub fn input(mut self, slot: InputSlot) -> Self {
        self.inputs.push(slot);
        self
    }

    pub fn outputs(mut self, count: usize) -> Self {
        self.outputs = count;
        self
    }

    pub fn thread_model(mut self, model: ThreadModel) -> Self {
        self.thread_model = model;
        self
    }

    /// Set hold-input mode for an output slot.
    pub fn hold_input(mut self, output_slot: usize, mode: HoldInput) -> Self {
        if self.hold_input.len() <= output_slot {
            self.hold_input.resize(output_slot + 1, HoldInput::None);
        }
        self.hold_input[output_slot] = mode;
        self
    }

    pub fn process<P: Process + 'static>(mut self, process: P) -> Self {
        self.process = Some(Box::new(process));
        self
    }

    pub fn hold_mode(&self, output_slot: usize) -> HoldInput {
        self.hold_input
            .get(output_slot)
            .copied()
            .unwrap_or(HoldInput::None)
    }

    /// Check slot consistency. Called by `Graph::install`.
    pub fn validate(&self, name: &str) -> PipelineResult<()> {
        let invalid = |reason: String| PipelineError::InvalidSlotMap {
            node: name.to_string(),
            reason,
        };

        if self.process.is_none() {
            return Err(PipelineError::MissingProcess(name.to_string()));
        }
        if self.inputs.is_empty() && self.outputs == 0 {
            return Err(invalid("node has neither inputs nor outputs".into()));
        }
        for (i, slot) in self.inputs.iter().enumerate() {
            if slot.max_depth == 0 {
                return Err(invalid(format!("input slot {} has zero depth", i)));
            }
        }
        if self.hold_input.len() > self.outputs {
            return Err(invalid(format!(
                "hold-input configured for {} outputs but node has {}",
                self.hold_input.len(),
                self.outputs
            )));
        }
        if self.inputs.is_empty() && self.hold_input.iter().any(|h| *h != HoldInput::None) {
            return Err(invalid("hold-input requires an input slot".into()));
        }
        Ok(())
    }
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlotMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotMap")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("thread_model", &self.thread_model)
            .field("hold_input", &self.hold_input)
            .field("has_process", &self.process.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::node::ProcessContext;

    fn noop(_: &mut ProcessContext<'_>) -> bool {
        true
    }

    #[test]
    fn test_valid_map() {
        let map = SlotMap::new()
            .input(InputSlot::frames(2))
            .input(InputSlot::latest(1))
            .outputs(1)
            .hold_input(0, HoldInput::Hold)
            .process(noop);
        assert!(map.validate("join").is_ok());
        assert_eq!(map.hold_mode(0), HoldInput::Hold);
        assert_eq!(map.hold_mode(3), HoldInput::None);
    }

    #[test]
    fn test_missing_process() {
        let map = SlotMap::new().input(InputSlot::frames(2));
        assert_eq!(
            map.validate("x"),
            Err(PipelineError::MissingProcess("x".into()))
        );
    }

    #[test]
    fn test_zero_depth_rejected() {
        let map = SlotMap::new().input(InputSlot::frames(0)).process(noop);
        assert!(matches!(
            map.validate("x"),
            Err(PipelineError::InvalidSlotMap { .. })
        ));
    }

    #[test]
    fn test_hold_input_needs_matching_output() {
        let map = SlotMap::new()
            .input(InputSlot::frames(1))
            .outputs(1)
            .hold_input(2, HoldInput::InheritFromInput)
            .process(noop);
        assert!(map.validate("x").is_err());
    }

    #[test]
    fn test_empty_node_rejected() {
        let map = SlotMap::new().process(noop);
        assert!(map.validate("x").is_err());
    }
}
