//! Input resolution for `{{ expr }}` templates.
//!
//! Every string input is classified as one of:
//!
//! - **pure**: the trimmed string is exactly `{{ expr }}`. The referenced
//!   value is returned with its JSON type intact, so a list stays a list.
//! - **mixed**: literal text with one or more embedded `{{ expr }}`. Each
//!   referenced value is rendered as text and spliced in; the result is a
//!   string. An unterminated `{{` and everything after it is kept verbatim.
//! - **literal**: no `{{` at all; returned unchanged.
//!
//! Expressions:
//! ```text
//! {{ memory.query }}        // lookup in the run's memory scope chain
//! {{ fetch_user.email }}    // output `email` of node `fetch_user`
//! ```
//!
//! Arrays and objects are resolved element by element; other JSON values
//! are passed through.

use std::collections::HashMap;
use std::sync::LazyLock;

use pipewright_memory::MemoryScope;
use regex::Regex;
use serde_json::Value;

use crate::error::RuntimeError;
use crate::node::Outputs;
use crate::outputs::OutputTable;

static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("placeholder pattern is valid"));

const MEMORY_PREFIX: &str = "memory.";

/// Reasons a template expression cannot be resolved.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
  #[error("memory key not found: {key}")]
  MemoryKeyNotFound { key: String },

  /// The referenced node has not produced outputs (it has not run yet, or
  /// was skipped).
  #[error("outputs for node '{node_id}' not found")]
  NodeOutputsNotFound { node_id: String },

  #[error("output key '{key}' not found in node '{node_id}'")]
  OutputKeyNotFound { node_id: String, key: String },

  #[error("invalid template expression: '{expr}'")]
  InvalidExpression { expr: String },
}

/// Resolve every input of a node.
///
/// The first input that fails is reported with the node id and input name.
pub fn resolve_inputs(
  node_id: &str,
  inputs: &HashMap<String, Value>,
  memory: &MemoryScope,
  outputs: &OutputTable,
) -> Result<Outputs, RuntimeError> {
  inputs
    .iter()
    .map(|(name, template)| {
      resolve_value(template, memory, outputs)
        .map(|value| (name.clone(), value))
        .map_err(|source| RuntimeError::Resolution {
          node_id: node_id.to_string(),
          input: name.clone(),
          source,
        })
    })
    .collect()
}

/// Resolve a single input value.
pub fn resolve_value(
  value: &Value,
  memory: &MemoryScope,
  outputs: &OutputTable,
) -> Result<Value, TemplateError> {
  match value {
    Value::String(s) => resolve_str(s, memory, outputs),
    Value::Array(items) => items
      .iter()
      .map(|item| resolve_value(item, memory, outputs))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
    Value::Object(map) => map
      .iter()
      .map(|(k, v)| resolve_value(v, memory, outputs).map(|v| (k.clone(), v)))
      .collect::<Result<serde_json::Map<_, _>, _>>()
      .map(Value::Object),
    other => Ok(other.clone()),
  }
}

fn resolve_str(s: &str, memory: &MemoryScope, outputs: &OutputTable) -> Result<Value, TemplateError> {
  if let Some(expr) = pure_expression(s) {
    return resolve_expression(expr, memory, outputs);
  }

  if !s.contains("{{") {
    return Ok(Value::String(s.to_string()));
  }

  let mut rendered = String::with_capacity(s.len());
  let mut last = 0;
  for caps in PLACEHOLDER.captures_iter(s) {
    let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
      continue;
    };
    rendered.push_str(&s[last..whole.start()]);
    let value = resolve_expression(expr.as_str().trim(), memory, outputs)?;
    rendered.push_str(&text_form(&value));
    last = whole.end();
  }
  // Anything after the last closed placeholder, including an unterminated
  // `{{`, is literal text.
  rendered.push_str(&s[last..]);

  Ok(Value::String(rendered))
}

/// Return the inner expression if `s` is exactly one placeholder.
fn pure_expression(s: &str) -> Option<&str> {
  let inner = s.trim().strip_prefix("{{")?.strip_suffix("}}")?;
  if inner.contains("{{") || inner.contains("}}") {
    return None;
  }
  Some(inner.trim())
}

fn resolve_expression(
  expr: &str,
  memory: &MemoryScope,
  outputs: &OutputTable,
) -> Result<Value, TemplateError> {
  if let Some(key) = expr.strip_prefix(MEMORY_PREFIX) {
    if key.is_empty() {
      return Err(TemplateError::InvalidExpression {
        expr: expr.to_string(),
      });
    }
    return memory
      .get(key)
      .ok_or_else(|| TemplateError::MemoryKeyNotFound {
        key: key.to_string(),
      });
  }

  let mut parts = expr.split('.');
  let (Some(node_id), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
    return Err(TemplateError::InvalidExpression {
      expr: expr.to_string(),
    });
  };
  if node_id.is_empty() || key.is_empty() {
    return Err(TemplateError::InvalidExpression {
      expr: expr.to_string(),
    });
  }

  let node_outputs = outputs
    .get(node_id)
    .ok_or_else(|| TemplateError::NodeOutputsNotFound {
      node_id: node_id.to_string(),
    })?;

  node_outputs
    .get(key)
    .cloned()
    .ok_or_else(|| TemplateError::OutputKeyNotFound {
      node_id: node_id.to_string(),
      key: key.to_string(),
    })
}

/// Textual form used when splicing a value into a mixed template.
///
/// Strings are inserted without quotes; everything else uses its compact
/// JSON form.
pub(crate) fn text_form(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
