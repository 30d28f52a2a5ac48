use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind};
use serde_json::Value;
use tracing::info;

use crate::error::NodeError;
use crate::node::{Node, NodeContext, Outputs};

const DEFAULT_MEMORY_KEY: &str = "final_answer";

/// Records the `result` input as the run's final result.
///
/// The value is bound in memory under `config.memory_key` (default
/// `final_answer`) and emitted as `final_result`.
pub struct ExitNode {
  id: String,
  memory_key: String,
}

impl ExitNode {
  pub fn from_def(def: &NodeDef) -> Self {
    Self {
      id: def.id.clone(),
      memory_key: def
        .config_str("memory_key")
        .unwrap_or(DEFAULT_MEMORY_KEY)
        .to_string(),
    }
  }
}

#[async_trait]
impl Node for ExitNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Exit
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let result = ctx.input("result").cloned().unwrap_or(Value::Null);

    info!(
      run_id = %ctx.run_id,
      node_id = %self.id,
      result = %result,
      "final result recorded"
    );

    ctx.memory.set(self.memory_key.clone(), result.clone());
    Ok(Outputs::from([("final_result".to_string(), result)]))
  }
}
