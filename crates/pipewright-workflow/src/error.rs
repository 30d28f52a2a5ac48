use thiserror::Error;

/// Structural problems found while building a pipeline graph.
///
/// These are always reported before any node runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
  #[error("pipeline must have at least one node")]
  Empty,

  #[error("duplicate node id: {node_id}")]
  DuplicateNode { node_id: String },

  #[error("edge {from} -> {to} references unknown node '{node_id}'")]
  DanglingEdge {
    from: String,
    to: String,
    node_id: String,
  },

  /// No ordering lets these nodes ever become ready.
  #[error("cycle detected in pipeline graph involving: {}", nodes.join(", "))]
  Cycle { nodes: Vec<String> },
}
