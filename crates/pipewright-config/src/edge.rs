use serde::{Deserialize, Serialize};

/// A directed dependency between two nodes.
///
/// An empty `source_handle` is unconditional. A non-empty handle is only
/// followed when the source node emits a matching branch selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
  pub source: String,
  pub target: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub source_handle: String,
}

impl EdgeDef {
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      source_handle: String::new(),
    }
  }

  /// Create an edge that is only followed for the given branch selector.
  pub fn with_handle(
    source: impl Into<String>,
    target: impl Into<String>,
    handle: impl Into<String>,
  ) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      source_handle: handle.into(),
    }
  }
}
