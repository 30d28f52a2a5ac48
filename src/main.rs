use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pipewright_config::load_pipeline;
use pipewright_runtime::{RuntimeConfig, RuntimeError, Scheduler};
use pipewright_store::{Checkpointer, Error as StoreError, SqliteCheckpointer};

/// Pipewright - run DAG pipeline definitions
#[derive(Parser)]
#[command(name = "pipewright")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the pipeline definition (JSON or YAML)
  #[arg(short, long)]
  file: PathBuf,

  /// JSON file with run inputs (default: JSON object piped on stdin)
  #[arg(long)]
  inputs: Option<PathBuf>,

  /// Checkpoint thread to resume from and save to
  #[arg(long, env = "PIPEWRIGHT_THREAD")]
  thread: Option<String>,

  /// Path to the checkpoint database (default: ~/.pipewright/checkpoints.db)
  #[arg(long, env = "PIPEWRIGHT_STATE_DB")]
  state_db: Option<PathBuf>,

  /// Default per-node timeout in milliseconds
  #[arg(long)]
  node_timeout_ms: Option<u64>,

  /// Log scheduler events at debug level
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(cli))
}

fn default_log_level(verbose: bool) -> &'static str {
  if verbose { "debug" } else { "info" }
}

fn init_tracing(verbose: bool) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

async fn run(cli: Cli) -> Result<()> {
  let def = load_pipeline(&cli.file)
    .with_context(|| format!("failed to load pipeline file: {}", cli.file.display()))?;

  eprintln!("Loaded pipeline: {} ({} nodes)", def.name, def.nodes.len());

  let config = RuntimeConfig {
    default_node_timeout: cli.node_timeout_ms.map(Duration::from_millis),
    ..RuntimeConfig::default()
  };
  let scheduler = Scheduler::from_def(def, config).context("invalid pipeline")?;

  let checkpoints = match &cli.thread {
    Some(_) => Some(open_checkpoints(cli.state_db.clone()).await?),
    None => None,
  };

  let mut inputs = HashMap::new();
  if let (Some(store), Some(thread)) = (&checkpoints, &cli.thread) {
    match store.load(thread).await {
      Ok(snapshot) => {
        info!(thread = %thread, keys = snapshot.len(), "checkpoint loaded");
        inputs.extend(snapshot);
      }
      Err(StoreError::ThreadNotFound(_)) => {
        info!(thread = %thread, "no checkpoint yet, starting fresh");
      }
      Err(e) => return Err(e).context("failed to load checkpoint"),
    }
  }

  let payload = match &cli.inputs {
    Some(path) => read_payload_from_file(path).await?,
    None => read_payload_from_stdin()?,
  };
  inputs.extend(payload);

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, cancelling run");
      on_interrupt.cancel();
    }
  });

  let result = match scheduler.run(inputs, cancel).await {
    Ok(result) => result,
    Err(e) => {
      let message = failure_message(&e);
      return Err(e).context(message);
    }
  };

  eprintln!("Execution completed: {}", result.run_id);
  eprintln!("Nodes executed: {}", result.outputs.len());

  if let (Some(store), Some(thread)) = (&checkpoints, &cli.thread) {
    store
      .save(thread, &result.memory)
      .await
      .context("failed to save checkpoint")?;
    eprintln!("Checkpoint saved: {}", thread);
  }

  let output = serde_json::json!({
    "run_id": result.run_id,
    "final_result": result.final_result,
    "outputs": result.outputs,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

fn failure_message(err: &RuntimeError) -> String {
  match err.node_id() {
    Some(node_id) => format!("pipeline execution failed at node '{}'", node_id),
    None => "pipeline execution failed".to_string(),
  }
}

async fn open_checkpoints(state_db: Option<PathBuf>) -> Result<SqliteCheckpointer> {
  let path = match state_db {
    Some(path) => path,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".pipewright")
      .join("checkpoints.db"),
  };

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create directory: {}", parent.display()))?;
  }

  SqliteCheckpointer::open(&path)
    .await
    .with_context(|| format!("failed to open checkpoint database: {}", path.display()))
}

async fn read_payload_from_file(path: &Path) -> Result<HashMap<String, Value>> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read inputs file: {}", path.display()))?;
  let value = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse inputs file: {}", path.display()))?;
  into_inputs(value)
}

fn read_payload_from_stdin() -> Result<HashMap<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(HashMap::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read inputs from stdin")?;

  if input.trim().is_empty() {
    return Ok(HashMap::new());
  }

  let value = serde_json::from_str(&input).context("failed to parse inputs JSON from stdin")?;
  into_inputs(value)
}

fn into_inputs(value: Value) -> Result<HashMap<String, Value>> {
  match value {
    Value::Object(map) => Ok(map.into_iter().collect()),
    other => bail!("run inputs must be a JSON object, got: {}", other),
  }
}

#[cfg(test)]
mod tests {
  use pipewright_runtime::NodeError;

  use super::*;

  #[test]
  fn test_default_log_level() {
    assert_eq!(default_log_level(false), "info");
    assert_eq!(default_log_level(true), "debug");
  }

  #[test]
  fn test_failure_message_names_node() {
    let err = RuntimeError::NodeExecution {
      node_id: "fetch".to_string(),
      source: NodeError::failed("boom"),
    };
    assert_eq!(
      failure_message(&err),
      "pipeline execution failed at node 'fetch'"
    );
    assert_eq!(
      failure_message(&RuntimeError::Cancelled),
      "pipeline execution failed"
    );
  }

  #[test]
  fn test_inputs_must_be_object() {
    assert!(into_inputs(serde_json::json!([1, 2])).is_err());
    let inputs = into_inputs(serde_json::json!({"q": "hi"})).unwrap();
    assert_eq!(inputs["q"], "hi");
  }
}
