//! Pipeline scheduler.
//!
//! A [`Scheduler`] owns one pipeline, its executable nodes, and the root
//! memory scope. [`Scheduler::run`] drives a single coordinating loop that
//! spawns one task per ready node into a [`JoinSet`] and applies each
//! completion to the readiness tracker. The first failure cancels the
//! run-scoped token, and the loop keeps joining until every spawned task
//! has finished before the error is returned.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use pipewright_config::{NodeKind, PipelineDef};
use pipewright_memory::MemoryScope;
use pipewright_workflow::Pipeline;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RuntimeConfig;
use crate::error::{NodeError, RuntimeError};
use crate::node::{BRANCH_KEY, EngineHandle, Node, NodeContext, Outputs};
use crate::nodes::build_node;
use crate::outputs::OutputTable;
use crate::readiness::{NodeState, Readiness};
use crate::template::{resolve_inputs, text_form};

/// Output key the exit node uses for the run's result.
const FINAL_RESULT_KEY: &str = "final_result";

type TaskOutcome = (String, Result<Outputs, RuntimeError>);

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
  pub run_id: String,
  /// Outputs of every completed node.
  pub outputs: HashMap<String, Outputs>,
  /// Final state of every node: completed or skipped.
  pub states: HashMap<String, NodeState>,
  /// Flattened memory as of the end of the run.
  pub memory: HashMap<String, Value>,
  /// Result recorded by the last completed exit node, if any.
  pub final_result: Option<Value>,
}

impl RunResult {
  pub fn state(&self, node_id: &str) -> Option<NodeState> {
    self.states.get(node_id).copied()
  }

  pub fn output(&self, node_id: &str, key: &str) -> Option<&Value> {
    self.outputs.get(node_id).and_then(|o| o.get(key))
  }

  /// Number of nodes in the given state.
  pub fn count(&self, state: NodeState) -> usize {
    self.states.values().filter(|s| **s == state).count()
  }

  pub fn final_result(&self) -> Option<&Value> {
    self.final_result.as_ref()
  }
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
  pipeline: Arc<Pipeline>,
  memory: Option<MemoryScope>,
  config: Option<RuntimeConfig>,
  engine: Option<EngineHandle>,
  custom: HashMap<String, Arc<dyn Node>>,
}

impl SchedulerBuilder {
  pub fn new(pipeline: impl Into<Arc<Pipeline>>) -> Self {
    Self {
      pipeline: pipeline.into(),
      memory: None,
      config: None,
      engine: None,
      custom: HashMap::new(),
    }
  }

  /// Use `memory` as the run's root scope instead of a fresh one.
  pub fn memory(mut self, memory: MemoryScope) -> Self {
    self.memory = Some(memory);
    self
  }

  pub fn config(mut self, config: RuntimeConfig) -> Self {
    self.config = Some(config);
    self
  }

  /// Share an existing engine handle. Takes precedence over
  /// [`SchedulerBuilder::config`].
  pub fn engine(mut self, engine: EngineHandle) -> Self {
    self.engine = Some(engine);
    self
  }

  /// Register a caller-supplied implementation for the node with the same
  /// id, replacing the built-in kind for that node.
  pub fn node(mut self, node: Arc<dyn Node>) -> Self {
    self.custom.insert(node.id().to_string(), node);
    self
  }

  pub fn build(mut self) -> Result<Scheduler, RuntimeError> {
    if let Some(unknown) = self
      .custom
      .keys()
      .find(|id| self.pipeline.get_node(id).is_none())
    {
      return Err(RuntimeError::Definition {
        node_id: unknown.clone(),
        message: "node is not part of the pipeline".to_string(),
      });
    }

    let mut nodes = HashMap::with_capacity(self.pipeline.len());
    for def in self.pipeline.nodes() {
      let node = match self.custom.remove(&def.id) {
        Some(node) => node,
        None => build_node(def)?,
      };
      nodes.insert(def.id.clone(), node);
    }

    let engine = self
      .engine
      .unwrap_or_else(|| EngineHandle::new(self.config.unwrap_or_default()));

    Ok(Scheduler {
      pipeline: self.pipeline,
      nodes,
      memory: self.memory.unwrap_or_default(),
      engine,
    })
  }
}

/// Executes a pipeline.
pub struct Scheduler {
  pipeline: Arc<Pipeline>,
  nodes: HashMap<String, Arc<dyn Node>>,
  memory: MemoryScope,
  engine: EngineHandle,
}

impl Scheduler {
  pub fn builder(pipeline: impl Into<Arc<Pipeline>>) -> SchedulerBuilder {
    SchedulerBuilder::new(pipeline)
  }

  /// Validate a definition and build a scheduler with built-in nodes only.
  pub fn from_def(def: PipelineDef, config: RuntimeConfig) -> Result<Self, RuntimeError> {
    let pipeline = Pipeline::from_def(def)?;
    SchedulerBuilder::new(pipeline).config(config).build()
  }

  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  /// The run's root memory scope.
  pub fn memory(&self) -> &MemoryScope {
    &self.memory
  }

  /// Run the pipeline to completion.
  ///
  /// `inputs` are bound in the root memory scope before any node starts.
  /// Cancelling `cancel` stops the run; it is never cancelled by the
  /// scheduler itself.
  #[instrument(
    name = "pipeline_run",
    skip(self, inputs, cancel),
    fields(pipeline = %self.pipeline.name)
  )]
  pub async fn run(
    &self,
    inputs: HashMap<String, Value>,
    cancel: CancellationToken,
  ) -> Result<RunResult, RuntimeError> {
    let run_id = uuid::Uuid::new_v4().to_string();

    info!(
      run_id = %run_id,
      pipeline = %self.pipeline.name,
      nodes = self.pipeline.len(),
      "pipeline_started"
    );

    self.memory.extend(inputs);

    let mut readiness = Readiness::new(self.pipeline.graph());
    let outputs = OutputTable::new();
    let run_token = cancel.child_token();
    let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
    let mut first_error: Option<RuntimeError> = None;

    for node_id in readiness.initial_ready() {
      if let Err(e) = self.dispatch(&node_id, &run_id, &outputs, &run_token, &mut tasks) {
        readiness.mark_failed(&node_id);
        record_failure(&mut first_error, e, &run_token);
        break;
      }
      readiness.mark_running(&node_id);
    }

    while !tasks.is_empty() {
      let joined = tokio::select! {
        _ = run_token.cancelled(), if first_error.is_none() => {
          warn!(run_id = %run_id, "pipeline cancelled by caller, draining tasks");
          first_error = Some(RuntimeError::Cancelled);
          continue;
        }
        joined = tasks.join_next() => joined,
      };

      let Some(joined) = joined else {
        break;
      };

      let (node_id, result) = match joined {
        Ok(outcome) => outcome,
        Err(join_error) => {
          error!(run_id = %run_id, error = %join_error, "node task aborted");
          let e = RuntimeError::TaskPanicked {
            node_id: "<unknown>".to_string(),
            message: join_error.to_string(),
          };
          record_failure(&mut first_error, e, &run_token);
          continue;
        }
      };

      if first_error.is_none() && run_token.is_cancelled() {
        warn!(run_id = %run_id, "pipeline cancelled by caller, draining tasks");
        first_error = Some(RuntimeError::Cancelled);
      }

      match result {
        Ok(node_outputs) => {
          let selector = branch_selector(&node_outputs);
          outputs.record(&node_id, node_outputs);

          if first_error.is_some() {
            // Keep the outputs but schedule nothing further.
            readiness.mark_completed(&node_id);
            debug!(run_id = %run_id, node_id = %node_id, "node completed after run failure");
            continue;
          }

          let transition = readiness.complete(&node_id, &selector);
          info!(
            run_id = %run_id,
            node_id = %node_id,
            kind = self.node_kind(&node_id),
            branch = %selector,
            "node_completed"
          );

          for skipped in &transition.skipped {
            info!(run_id = %run_id, node_id = %skipped, "node_skipped");
          }

          for next in transition.ready {
            if let Err(e) = self.dispatch(&next, &run_id, &outputs, &run_token, &mut tasks) {
              readiness.mark_failed(&next);
              record_failure(&mut first_error, e, &run_token);
              break;
            }
            readiness.mark_running(&next);
          }
        }
        Err(e) => {
          readiness.mark_failed(&node_id);
          if first_error.is_none() {
            error!(run_id = %run_id, node_id = %node_id, error = %e, "node_failed");
          } else {
            debug!(run_id = %run_id, node_id = %node_id, error = %e, "node stopped after run failure");
          }
          record_failure(&mut first_error, e, &run_token);
        }
      }
    }

    if first_error.is_none() && run_token.is_cancelled() {
      first_error = Some(RuntimeError::Cancelled);
    }

    if let Some(e) = first_error {
      error!(run_id = %run_id, error = %e, "pipeline_failed");
      return Err(e);
    }

    if !readiness.is_finished() {
      let e = RuntimeError::Stalled {
        nodes: readiness.unresolved(),
      };
      error!(run_id = %run_id, error = %e, "pipeline_failed");
      return Err(e);
    }

    let final_result = self
      .pipeline
      .graph()
      .nodes()
      .iter()
      .filter(|id| readiness.state(id) == Some(NodeState::Completed))
      .filter(|id| {
        self
          .nodes
          .get(*id)
          .is_some_and(|n| n.kind() == NodeKind::Exit)
      })
      .filter_map(|id| outputs.get(id).and_then(|o| o.get(FINAL_RESULT_KEY).cloned()))
      .last();

    let outputs = outputs.snapshot();
    info!(
      run_id = %run_id,
      completed = outputs.len(),
      "pipeline_completed"
    );

    Ok(RunResult {
      run_id,
      outputs,
      states: readiness.states().clone(),
      memory: self.memory.get_all(),
      final_result,
    })
  }

  fn node_kind(&self, node_id: &str) -> &'static str {
    self
      .nodes
      .get(node_id)
      .map(|node| node.kind().as_str())
      .unwrap_or("unknown")
  }

  /// Spawn the task for one ready node.
  fn dispatch(
    &self,
    node_id: &str,
    run_id: &str,
    outputs: &OutputTable,
    run_token: &CancellationToken,
    tasks: &mut JoinSet<TaskOutcome>,
  ) -> Result<(), RuntimeError> {
    let (Some(node), Some(def)) = (self.nodes.get(node_id), self.pipeline.get_node(node_id)) else {
      return Err(RuntimeError::Definition {
        node_id: node_id.to_string(),
        message: "no executable node registered".to_string(),
      });
    };

    let timeout = def
      .timeout_ms
      .map(Duration::from_millis)
      .or(self.engine.config().default_node_timeout);

    let task = NodeTask {
      node: node.clone(),
      node_id: node_id.to_string(),
      run_id: run_id.to_string(),
      templates: def.inputs.clone(),
      memory: self.memory.clone(),
      outputs: outputs.clone(),
      cancel: run_token.clone(),
      engine: self.engine.clone(),
      timeout,
      grace: self.engine.config().cancel_grace,
    };

    info!(
      run_id = %run_id,
      node_id = %node_id,
      kind = %node.kind(),
      "node_started"
    );

    let id = node_id.to_string();
    tasks.spawn(async move {
      let result = AssertUnwindSafe(task.execute())
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
          Err(RuntimeError::TaskPanicked {
            node_id: id.clone(),
            message: panic_message(panic.as_ref()),
          })
        });
      (id, result)
    });

    Ok(())
  }
}

/// Everything one node task needs, moved into the spawned future.
struct NodeTask {
  node: Arc<dyn Node>,
  node_id: String,
  run_id: String,
  templates: HashMap<String, Value>,
  memory: MemoryScope,
  outputs: OutputTable,
  cancel: CancellationToken,
  engine: EngineHandle,
  timeout: Option<Duration>,
  /// How long a cancelled node may keep running to wind down its own work.
  grace: Duration,
}

impl NodeTask {
  async fn execute(self) -> Result<Outputs, RuntimeError> {
    let NodeTask {
      node,
      node_id,
      run_id,
      templates,
      memory,
      outputs,
      cancel,
      engine,
      timeout,
      grace,
    } = self;

    if cancel.is_cancelled() {
      return Err(RuntimeError::NodeExecution {
        node_id,
        source: NodeError::Cancelled,
      });
    }

    let inputs = resolve_inputs(&node_id, &templates, &memory, &outputs)?;

    let ctx = NodeContext {
      run_id,
      node_id: node_id.clone(),
      inputs,
      memory,
      cancel: cancel.clone(),
      engine,
    };

    let execution = node.execute(ctx);
    let bounded = async move {
      match timeout {
        Some(limit) => tokio::time::timeout(limit, execution)
          .await
          .unwrap_or_else(|_| {
            Err(NodeError::Timeout {
              timeout_ms: millis(limit),
            })
          }),
        None => execution.await,
      }
    };

    tokio::pin!(bounded);

    let result = tokio::select! {
      result = &mut bounded => result,
      _ = cancel.cancelled() => {
        // Nodes that own sub-tasks, such as iteration, drain them here.
        tokio::time::timeout(grace, &mut bounded)
          .await
          .unwrap_or(Err(NodeError::Cancelled))
      }
    };

    result.map_err(|source| RuntimeError::NodeExecution { node_id, source })
  }
}

/// Keep the first error and cancel the run; later errors are dropped.
fn record_failure(
  first_error: &mut Option<RuntimeError>,
  error: RuntimeError,
  run_token: &CancellationToken,
) {
  if first_error.is_none() {
    *first_error = Some(error);
    run_token.cancel();
  }
}

fn millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn branch_selector(outputs: &Outputs) -> String {
  match outputs.get(BRANCH_KEY) {
    None | Some(Value::Null) => String::new(),
    Some(value) => text_form(value),
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_millis_saturates() {
    assert_eq!(millis(Duration::from_millis(1500)), 1500);
    assert_eq!(millis(Duration::MAX), u64::MAX);
  }

  #[test]
  fn test_branch_selector() {
    assert_eq!(branch_selector(&Outputs::new()), "");
    assert_eq!(
      branch_selector(&Outputs::from([(BRANCH_KEY.to_string(), Value::Null)])),
      ""
    );
    assert_eq!(
      branch_selector(&Outputs::from([(BRANCH_KEY.to_string(), json!("true"))])),
      "true"
    );
    assert_eq!(
      branch_selector(&Outputs::from([(BRANCH_KEY.to_string(), json!(2))])),
      "2"
    );
  }
}
