//! Node-based dataflow graph.
//!
//! Buffers flow between nodes ("flows") over edges that connect an output
//! slot of one node to an input slot of another. Every node owns a dedicated
//! worker thread and a set of bounded input queues; nothing serializes
//! unrelated nodes.
//!
//! # Architecture
//!
//! ```text
//! capture ──► [InferenceFlow] ──► [EmbedFlow] ──► encoder ──► UVC
//!        └──────────────────────────┘
//!
//! UVC ──► [ExtractFlow] ──► [ComposeFlow] ──► RenderSink
//!                      └──────────┘
//! ```
//!
//! # Design
//!
//! - **Process values, not subclasses**: a node is a `SlotMap` plus a boxed
//!   [`Process`]; closures implement it directly.
//! - **Per-slot queue policy**: drop-oldest or block-producer, blocking or
//!   best-effort fetch.
//! - **Live rewiring**: `connect`/`disconnect` are legal while workers run;
//!   `disconnect` waits for in-flight deliveries on the removed edges.
//! - **Contained failures**: a `false` return or a panic costs one cycle of
//!   one node and nothing else.

pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod nodes;
pub mod queue;
pub mod sink;
pub mod slot;

pub use error::{PipelineError, PipelineResult};
pub use graph::{EdgeInfo, Graph, NodeSnapshot, TopologySnapshot};
pub use id::{EdgeId, NodeId};
pub use node::{NodeStats, Process, ProcessContext};
pub use queue::PushOutcome;
pub use sink::{ChannelSink, SinkMessage};
pub use slot::{FetchMode, FullPolicy, HoldInput, InputSlot, SlotMap, ThreadModel};
