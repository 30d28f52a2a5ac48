use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of node kinds a definition may use.
///
/// Kinds are written in snake_case. The CamelCase names used by older
/// definition files are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  /// Seeds memory with its inputs and emits the flattened scope.
  #[serde(alias = "Start")]
  Entry,
  /// Records the run's final result into memory.
  #[serde(alias = "End")]
  Exit,
  /// Compares one input against a literal and emits a branch selector.
  #[serde(alias = "IfElse")]
  Conditional,
  /// Runs an embedded sub-pipeline once per list element.
  #[serde(alias = "Loop")]
  Iteration,
  #[serde(alias = "LLM")]
  Llm,
  #[serde(alias = "HttpRequest")]
  HttpRequest,
  #[serde(alias = "Code")]
  Code,
  #[serde(alias = "Answer")]
  Answer,
  #[serde(alias = "Tool")]
  Tool,
}

impl NodeKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      NodeKind::Entry => "entry",
      NodeKind::Exit => "exit",
      NodeKind::Conditional => "conditional",
      NodeKind::Iteration => "iteration",
      NodeKind::Llm => "llm",
      NodeKind::HttpRequest => "http_request",
      NodeKind::Code => "code",
      NodeKind::Answer => "answer",
      NodeKind::Tool => "tool",
    }
  }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_snake_case_names() {
    let kind: NodeKind = serde_json::from_str("\"http_request\"").unwrap();
    assert_eq!(kind, NodeKind::HttpRequest);
    assert_eq!(kind.to_string(), "http_request");
  }

  #[test]
  fn test_legacy_aliases() {
    let cases = [
      ("Start", NodeKind::Entry),
      ("End", NodeKind::Exit),
      ("IfElse", NodeKind::Conditional),
      ("Loop", NodeKind::Iteration),
      ("LLM", NodeKind::Llm),
      ("Tool", NodeKind::Tool),
    ];
    for (name, expected) in cases {
      let kind: NodeKind = serde_json::from_value(serde_json::json!(name)).unwrap();
      assert_eq!(kind, expected, "alias {}", name);
    }
  }

  #[test]
  fn test_unknown_kind_rejected() {
    let result: Result<NodeKind, _> = serde_json::from_str("\"Webhook\"");
    assert!(result.is_err());
  }
}
