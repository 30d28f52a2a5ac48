use std::sync::Arc;

use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind, PipelineDef};
use pipewright_workflow::Pipeline;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::info;

use crate::error::{NodeError, RuntimeError};
use crate::node::{Node, NodeContext, Outputs};
use crate::nodes::{build_node, invalid_definition};
use crate::scheduler::RunResult;

const DEFAULT_ITEM_KEY: &str = "loop_item";

/// Runs an embedded sub-pipeline once per element of its `list` input.
///
/// Each instance gets a fresh child of the enclosing memory scope with the
/// element bound under `config.item_key` (default `loop_item`), and its own
/// scheduler and outputs table. All instances run concurrently and all are
/// allowed to finish; the first failure by index is then reported. The
/// `results` output holds each instance's outputs table in input order.
pub struct IterationNode {
  id: String,
  item_key: String,
  body: Arc<Pipeline>,
}

impl IterationNode {
  pub fn from_def(def: &NodeDef) -> Result<Self, RuntimeError> {
    let raw = def
      .config
      .get("sub_workflow")
      .cloned()
      .ok_or_else(|| invalid_definition(def, "missing 'sub_workflow' config"))?;

    let body_def = PipelineDef::from_value(raw)
      .map_err(|e| invalid_definition(def, format!("invalid sub_workflow: {}", e)))?;
    let body = Pipeline::from_def(body_def)
      .map_err(|e| invalid_definition(def, format!("invalid sub_workflow: {}", e)))?;

    // Surface bad nested config now rather than on the first element.
    for nested in body.nodes() {
      build_node(nested)?;
    }

    Ok(Self {
      id: def.id.clone(),
      item_key: def
        .config_str("item_key")
        .unwrap_or(DEFAULT_ITEM_KEY)
        .to_string(),
      body: Arc::new(body),
    })
  }
}

#[async_trait]
impl Node for IterationNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Iteration
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let items = match ctx.require_input("list")? {
      Value::Array(items) => items.clone(),
      other => {
        return Err(NodeError::InvalidInput {
          input: "list".to_string(),
          message: format!("expected an array, got {}", json_type(other)),
        });
      }
    };

    info!(
      run_id = %ctx.run_id,
      node_id = %self.id,
      count = items.len(),
      "iteration_started"
    );

    // Dropping the set aborts any instance still running, so a cancelled
    // parent never leaves sub-runs behind.
    let mut instances: JoinSet<(usize, Result<RunResult, RuntimeError>)> = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
      let scope = ctx.memory.child();
      scope.set(self.item_key.clone(), item);

      let engine = ctx.engine.clone();
      let body = self.body.clone();
      let cancel = ctx.cancel.child_token();
      instances.spawn(async move { (index, engine.run_nested(body, scope, cancel).await) });
    }

    let mut finished: Vec<Option<Result<RunResult, RuntimeError>>> =
      std::iter::repeat_with(|| None).take(instances.len()).collect();

    // Sub-runs share the parent's token, so on cancellation each one drains
    // its own tasks and returns; wait for all of them.
    while let Some(joined) = instances.join_next().await {
      let (index, result) =
        joined.map_err(|e| NodeError::failed(format!("iteration task failed: {}", e)))?;
      finished[index] = Some(result);
    }

    if ctx.cancel.is_cancelled() {
      return Err(NodeError::Cancelled);
    }

    let mut results = Vec::with_capacity(finished.len());
    for (index, result) in finished.into_iter().enumerate() {
      match result {
        Some(Ok(run)) => results.push(instance_outputs(run)),
        Some(Err(e)) => {
          return Err(NodeError::Iteration {
            index,
            source: Box::new(e),
          });
        }
        None => {
          return Err(NodeError::failed(format!("iteration {} produced no result", index)));
        }
      }
    }

    info!(
      run_id = %ctx.run_id,
      node_id = %self.id,
      count = results.len(),
      "iteration_completed"
    );

    Ok(Outputs::from([("results".to_string(), Value::Array(results))]))
  }
}

/// One instance's outputs table as `{ node_id: { key: value } }`.
fn instance_outputs(run: RunResult) -> Value {
  Value::Object(
    run
      .outputs
      .into_iter()
      .map(|(node_id, outputs)| (node_id, Value::Object(outputs.into_iter().collect())))
      .collect(),
  )
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
