//! Runtime error types.

use pipewright_workflow::GraphError;

use crate::template::TemplateError;

/// Errors a node reports from [`crate::Node::execute`].
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
  /// A required input was not provided.
  #[error("missing required input: {input}")]
  MissingInput { input: String },

  /// An input was present but unusable.
  #[error("invalid input '{input}': {message}")]
  InvalidInput { input: String, message: String },

  /// The node's static config is unusable.
  #[error("invalid config: {message}")]
  InvalidConfig { message: String },

  /// An outbound HTTP request failed.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// A remote service answered with an error status.
  #[error("upstream returned {status}: {body}")]
  Upstream { status: u16, body: String },

  /// Writing node output to the terminal failed.
  #[error("output error: {0}")]
  Output(#[from] std::io::Error),

  /// Script evaluation failed.
  #[error("script error: {message}")]
  Script { message: String },

  /// One instance of an iteration failed.
  #[error("iteration {index} failed: {source}")]
  Iteration {
    index: usize,
    #[source]
    source: Box<RuntimeError>,
  },

  /// The node observed run cancellation.
  #[error("node cancelled")]
  Cancelled,

  /// The node exceeded its deadline.
  #[error("node timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// Catch-all for caller-supplied node implementations.
  #[error("{message}")]
  Failed { message: String },
}

impl NodeError {
  pub fn failed(message: impl Into<String>) -> Self {
    NodeError::Failed {
      message: message.into(),
    }
  }

  /// Whether this error is a cancellation or deadline rather than a fault
  /// in the node itself.
  pub fn is_cancellation(&self) -> bool {
    matches!(self, NodeError::Cancelled | NodeError::Timeout { .. })
  }
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The pipeline graph is structurally invalid.
  #[error("invalid graph: {0}")]
  Graph(#[from] GraphError),

  /// A node definition could not be turned into an executable node.
  #[error("invalid definition for node '{node_id}': {message}")]
  Definition { node_id: String, message: String },

  /// A node's input templates could not be resolved.
  #[error("failed to resolve input '{input}' for node '{node_id}': {source}")]
  Resolution {
    node_id: String,
    input: String,
    #[source]
    source: TemplateError,
  },

  /// A node's execute call failed.
  #[error("node '{node_id}' failed: {source}")]
  NodeExecution {
    node_id: String,
    #[source]
    source: NodeError,
  },

  /// The caller cancelled the run.
  #[error("run cancelled")]
  Cancelled,

  /// A node task panicked.
  #[error("node '{node_id}' panicked: {message}")]
  TaskPanicked { node_id: String, message: String },

  /// The scheduler ran out of work with nodes still unresolved.
  #[error("run stalled with unresolved nodes: {}", nodes.join(", "))]
  Stalled { nodes: Vec<String> },
}

impl RuntimeError {
  /// The node the error originated from, when there is one.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      RuntimeError::Definition { node_id, .. }
      | RuntimeError::Resolution { node_id, .. }
      | RuntimeError::NodeExecution { node_id, .. }
      | RuntimeError::TaskPanicked { node_id, .. } => Some(node_id),
      _ => None,
    }
  }

  /// Whether the run ended because of cancellation or a deadline.
  pub fn is_cancellation(&self) -> bool {
    match self {
      RuntimeError::Cancelled => true,
      RuntimeError::NodeExecution { source, .. } => source.is_cancellation(),
      _ => false,
    }
  }
}
