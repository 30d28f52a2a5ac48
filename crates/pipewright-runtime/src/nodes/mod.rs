//! Built-in node kinds.
//!
//! [`build_node`] is the single place a [`NodeKind`] is mapped to an
//! implementation. Adding a kind means adding a variant and an arm here.

mod answer;
mod code;
mod conditional;
mod entry;
mod exit;
mod http;
mod iteration;
mod llm;
mod tool;

use std::sync::Arc;

use pipewright_config::{NodeDef, NodeKind};

use crate::error::RuntimeError;
use crate::node::Node;

pub use answer::AnswerNode;
pub use code::CodeNode;
pub use conditional::ConditionalNode;
pub use entry::EntryNode;
pub use exit::ExitNode;
pub use http::HttpRequestNode;
pub use iteration::IterationNode;
pub use llm::LlmNode;
pub use tool::ToolNode;

/// Build the built-in implementation for a node definition.
///
/// Static config is validated here, so a bad definition fails before the
/// run starts.
pub fn build_node(def: &NodeDef) -> Result<Arc<dyn Node>, RuntimeError> {
  let node: Arc<dyn Node> = match def.kind {
    NodeKind::Entry => Arc::new(EntryNode::new(&def.id)),
    NodeKind::Exit => Arc::new(ExitNode::from_def(def)),
    NodeKind::Conditional => Arc::new(ConditionalNode::from_def(def)?),
    NodeKind::Iteration => Arc::new(IterationNode::from_def(def)?),
    NodeKind::Answer => Arc::new(AnswerNode::from_def(def)),
    NodeKind::Code => Arc::new(CodeNode::from_def(def)),
    NodeKind::HttpRequest => Arc::new(HttpRequestNode::from_def(def)?),
    NodeKind::Llm => Arc::new(LlmNode::from_def(def)),
    NodeKind::Tool => Arc::new(ToolNode::from_def(def)?),
  };
  Ok(node)
}

fn invalid_definition(def: &NodeDef, message: impl Into<String>) -> RuntimeError {
  RuntimeError::Definition {
    node_id: def.id.clone(),
    message: message.into(),
  }
}
