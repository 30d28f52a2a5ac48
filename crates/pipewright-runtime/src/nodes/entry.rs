use async_trait::async_trait;
use pipewright_config::NodeKind;

use crate::error::NodeError;
use crate::node::{Node, NodeContext, Outputs};

/// Binds its inputs in memory and emits the flattened scope.
///
/// This is how run inputs become visible to `{{ entry.key }}` templates.
pub struct EntryNode {
  id: String,
}

impl EntryNode {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into() }
  }
}

#[async_trait]
impl Node for EntryNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Entry
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    ctx.memory.extend(ctx.inputs);
    Ok(ctx.memory.get_all())
  }
}
