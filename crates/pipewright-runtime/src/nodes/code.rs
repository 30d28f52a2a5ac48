use async_trait::async_trait;
use mlua::{HookTriggers, Lua, LuaOptions, LuaSerdeExt, StdLib, VmState};
use pipewright_config::{NodeDef, NodeKind};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;
use crate::node::{Node, NodeContext, Outputs};

/// Instructions between cancellation checks.
const HOOK_INTERVAL: u32 = 10_000;
const MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// Evaluates a Lua script.
///
/// The script comes from `config.code`, falling back to the `code` input.
/// Inputs are visible as the `input` table and as individual globals. A
/// returned table becomes the node's outputs; any other value is emitted
/// as `result`.
pub struct CodeNode {
  id: String,
  code: Option<String>,
}

impl CodeNode {
  pub fn from_def(def: &NodeDef) -> Self {
    Self {
      id: def.id.clone(),
      code: def
        .config_str("code")
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string),
    }
  }
}

#[async_trait]
impl Node for CodeNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Code
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let code = self
      .code
      .clone()
      .or_else(|| {
        ctx
          .input("code")
          .and_then(Value::as_str)
          .filter(|c| !c.trim().is_empty())
          .map(str::to_string)
      })
      .ok_or_else(|| NodeError::InvalidConfig {
        message: format!("no code provided for node '{}'", self.id),
      })?;

    match run_script(code, ctx.inputs.clone(), ctx.cancel.clone()).await? {
      Value::Object(map) => Ok(map.into_iter().collect()),
      other => Ok(Outputs::from([("result".to_string(), other)])),
    }
  }
}

/// Evaluate a script on the blocking pool.
///
/// `globals` are bound both individually and as the `input` table.
pub(crate) async fn run_script(
  code: String,
  globals: Outputs,
  cancel: CancellationToken,
) -> Result<Value, NodeError> {
  let token = cancel.clone();
  let result = tokio::task::spawn_blocking(move || eval(&code, &globals, &token))
    .await
    .map_err(|e| NodeError::Script {
      message: format!("script task failed: {}", e),
    })?;

  match result {
    Err(_) if cancel.is_cancelled() => Err(NodeError::Cancelled),
    Err(e) => Err(NodeError::Script {
      message: e.to_string(),
    }),
    Ok(value) => Ok(value),
  }
}

/// Evaluate in a fresh sandbox with only the table, string, math and utf8
/// libraries loaded.
fn eval(code: &str, globals: &Outputs, cancel: &CancellationToken) -> mlua::Result<Value> {
  let lua = Lua::new_with(
    StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
    LuaOptions::new(),
  )?;
  lua.set_memory_limit(MEMORY_LIMIT)?;

  let token = cancel.clone();
  lua.set_hook(
    HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
    move |_, _| {
      if token.is_cancelled() {
        Err(mlua::Error::RuntimeError("script cancelled".to_string()))
      } else {
        Ok(VmState::Continue)
      }
    },
  );

  let env = lua.globals();
  env.set("input", lua.to_value(globals)?)?;
  for (name, value) in globals {
    env.set(name.as_str(), lua.to_value(value)?)?;
  }

  let value: mlua::Value = lua.load(code).eval()?;
  lua.from_value(value)
}
