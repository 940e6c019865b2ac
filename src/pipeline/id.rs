//! Identity types for the graph.
//!
//! Node IDs are newtypes over `u32` that serve as direct indices into the
//! graph's node table, providing O(1) lookup. Edge IDs are allocated from a
//! monotonically increasing counter and never reused.

use crate::pipeline::error::{PipelineError, PipelineResult};
use std::fmt;

/// Index into the graph's node table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Id of the node stored at `index` in the node table.
    pub(crate) fn from_index(index: usize) -> PipelineResult<NodeId> {
        u32::try_from(index)
            .map(NodeId)
            .map_err(|_| PipelineError::TooManyNodes(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identifier of a single (source slot → destination slot) edge.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub u64);

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::from_index(42).unwrap();
        assert_eq!(id, NodeId(42));
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{}", id), "NodeId(42)");
        assert_eq!(NodeId::from_index(u32::MAX as usize), Ok(NodeId(u32::MAX)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_node_index_beyond_u32() {
        let index = u32::MAX as usize + 1;
        assert_eq!(
            NodeId::from_index(index),
            Err(PipelineError::TooManyNodes(index))
        );
    }

    #[test]
    fn test_edge_id_display() {
        assert_eq!(EdgeId(7).to_string(), "EdgeId(7)");
    }
}
