//! The node execution contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pipewright_config::NodeKind;
use pipewright_memory::MemoryScope;
use pipewright_workflow::Pipeline;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::error::{NodeError, RuntimeError};
use crate::scheduler::{RunResult, SchedulerBuilder};

/// A node's named outputs.
pub type Outputs = HashMap<String, Value>;

/// Output key a node sets to choose which outgoing edges are followed.
///
/// An outgoing edge is active only when its handle equals this value. A
/// node that does not set it selects the empty handle.
pub const BRANCH_KEY: &str = "_branch_id";

/// A step in a pipeline.
///
/// The scheduler resolves the node's input templates before calling
/// [`Node::execute`], and records the returned outputs only after the call
/// completes.
#[async_trait]
pub trait Node: Send + Sync {
  fn id(&self) -> &str;

  fn kind(&self) -> NodeKind;

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError>;
}

/// Everything a node receives for one execution.
pub struct NodeContext {
  pub run_id: String,
  pub node_id: String,
  /// Inputs with all templates resolved.
  pub inputs: Outputs,
  /// The memory scope of the run this node belongs to.
  pub memory: MemoryScope,
  /// Cancelled when the run fails elsewhere or the caller gives up.
  pub cancel: CancellationToken,
  pub engine: EngineHandle,
}

impl NodeContext {
  pub fn input(&self, name: &str) -> Option<&Value> {
    self.inputs.get(name)
  }

  pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
    self.inputs.get(name).ok_or_else(|| NodeError::MissingInput {
      input: name.to_string(),
    })
  }

  /// A string input. Non-string values are rendered as compact JSON.
  pub fn input_text(&self, name: &str) -> Option<String> {
    self.inputs.get(name).map(crate::template::text_form)
  }
}

/// Shared services handed to nodes, and the way back into the scheduler.
///
/// Cloning is cheap; nested runs share the parent's config and HTTP client.
#[derive(Clone)]
pub struct EngineHandle {
  config: Arc<RuntimeConfig>,
  http: reqwest::Client,
}

impl EngineHandle {
  pub fn new(config: RuntimeConfig) -> Self {
    let http = reqwest::Client::builder()
      .timeout(config.http_timeout)
      .build()
      .unwrap_or_default();
    Self {
      config: Arc::new(config),
      http,
    }
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  pub fn http(&self) -> &reqwest::Client {
    &self.http
  }

  /// Build and run an independent scheduler over `pipeline`.
  ///
  /// The nested run gets its own outputs table and uses `memory` as its root
  /// scope, so callers pass a fresh child scope to keep it isolated.
  pub async fn run_nested(
    &self,
    pipeline: Arc<Pipeline>,
    memory: MemoryScope,
    cancel: CancellationToken,
  ) -> Result<RunResult, RuntimeError> {
    let scheduler = SchedulerBuilder::new(pipeline)
      .engine(self.clone())
      .memory(memory)
      .build()?;
    scheduler.run(HashMap::new(), cancel).await
  }
}

impl Default for EngineHandle {
  fn default() -> Self {
    Self::new(RuntimeConfig::default())
  }
}
