use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::kind::NodeKind;

/// A single step in a pipeline definition.
///
/// `inputs` maps input names to values. String values may contain
/// `{{ expr }}` templates which are resolved when the node runs; any other
/// JSON value is passed through as a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  #[serde(alias = "node_id")]
  pub id: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
  #[serde(default)]
  pub config: serde_json::Map<String, serde_json::Value>,
  #[serde(default)]
  pub inputs: HashMap<String, serde_json::Value>,
  /// Declared output names. Informational only.
  #[serde(default)]
  pub outputs: HashMap<String, String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl NodeDef {
  pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: id.into(),
      kind,
      config: serde_json::Map::new(),
      inputs: HashMap::new(),
      outputs: HashMap::new(),
      timeout_ms: None,
    }
  }

  /// Add an input mapping.
  pub fn input(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self.inputs.insert(name.into(), value.into());
    self
  }

  /// Add a static config entry.
  pub fn config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self.config.insert(key.into(), value.into());
    self
  }

  /// Look up a string config entry.
  pub fn config_str(&self, key: &str) -> Option<&str> {
    self.config.get(key).and_then(|v| v.as_str())
  }
}
