//! Graph construction errors.

use crate::pipeline::id::NodeId;
use thiserror::Error;

/// Errors raised while installing or wiring nodes. All of them are fatal at
/// construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid slot map for node '{node}': {reason}")]
    InvalidSlotMap { node: String, reason: String },

    #[error("Node '{0}' has no process function")]
    MissingProcess(String),

    #[error("A node named '{0}' is already installed")]
    DuplicateName(String),

    #[error("Node table is full ({0} entries)")]
    TooManyNodes(usize),

    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("Node {node:?} has no {direction} slot {slot}")]
    InvalidSlot {
        node: NodeId,
        direction: &'static str,
        slot: usize,
    },

    #[error("Node {0:?} is stopped")]
    Stopped(NodeId),

    #[error("Failed to spawn worker for '{node}': {message}")]
    Spawn { node: String, message: String },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
