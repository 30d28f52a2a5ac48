use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::edge::EdgeDef;
use crate::error::ConfigError;
use crate::node::NodeDef;

/// Declared shape of the pipeline's memory. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDef {
  #[serde(default)]
  pub schema: HashMap<String, String>,
}

/// A complete pipeline definition.
///
/// `name` and `version` default to empty so that embedded sub-pipelines
/// only need `nodes` and `edges`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub memory: MemoryDef,
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<EdgeDef>,
}

impl PipelineDef {
  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml_ng::from_str(content)?)
  }

  /// Build a definition from an already-parsed value, such as the
  /// `sub_workflow` config entry of an iteration node.
  pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
    Ok(serde_json::from_value(value)?)
  }
}

/// Load a pipeline definition from disk.
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<PipelineDef, ConfigError> {
  let path = path.as_ref();
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;

  let is_json = path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

  if is_json {
    PipelineDef::from_json_str(&content)
  } else {
    PipelineDef::from_yaml_str(&content)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::NodeKind;

  const BRANCHING_YAML: &str = r#"
name: branching
version: "1.0"
memory:
  schema:
    query: string
nodes:
  - id: start
    type: Start
  - id: check
    type: IfElse
    config:
      operator: equals
      value: a
    inputs:
      input: "{{ memory.query }}"
  - id: matched
    type: End
    inputs:
      result: "matched"
edges:
  - source: start
    target: check
  - source: check
    target: matched
    source_handle: "true"
"#;

  #[test]
  fn test_parse_yaml() {
    let def = PipelineDef::from_yaml_str(BRANCHING_YAML).unwrap();
    assert_eq!(def.name, "branching");
    assert_eq!(def.memory.schema.get("query").map(String::as_str), Some("string"));
    assert_eq!(def.nodes.len(), 3);
    assert_eq!(def.nodes[1].kind, NodeKind::Conditional);
    assert_eq!(def.nodes[1].config_str("value"), Some("a"));
    assert_eq!(def.edges[0].source_handle, "");
    assert_eq!(def.edges[1].source_handle, "true");
  }

  #[test]
  fn test_parse_json_defaults() {
    let def = PipelineDef::from_json_str(
      r#"{"nodes": [{"id": "a", "type": "entry"}], "edges": []}"#,
    )
    .unwrap();
    assert_eq!(def.name, "");
    assert!(def.nodes[0].inputs.is_empty());
    assert_eq!(def.nodes[0].timeout_ms, None);
  }

  #[test]
  fn test_unknown_kind_is_error() {
    let result = PipelineDef::from_json_str(r#"{"nodes": [{"id": "a", "type": "bogus"}]}"#);
    assert!(matches!(result, Err(ConfigError::Json(_))));
  }

  #[test]
  fn test_load_pipeline_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let yaml_path = dir.path().join("flow.yaml");
    std::fs::write(&yaml_path, BRANCHING_YAML).unwrap();
    assert_eq!(load_pipeline(&yaml_path).unwrap().nodes.len(), 3);

    let json_path = dir.path().join("flow.json");
    std::fs::write(&json_path, r#"{"name": "j", "nodes": []}"#).unwrap();
    assert_eq!(load_pipeline(&json_path).unwrap().name, "j");
  }

  #[test]
  fn test_load_missing_file() {
    let result = load_pipeline("/nonexistent/pipeline.yaml");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
  }
}
