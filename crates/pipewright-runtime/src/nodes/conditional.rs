use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind};
use serde_json::Value;

use crate::error::{NodeError, RuntimeError};
use crate::node::{BRANCH_KEY, Node, NodeContext, Outputs};
use crate::nodes::invalid_definition;
use crate::template::text_form;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
  Equals,
  Contains,
}

/// Compares the textual form of its `input` against a configured literal.
///
/// Emits `result` and selects the `"true"` or `"false"` branch.
pub struct ConditionalNode {
  id: String,
  operator: Operator,
  value: String,
}

impl ConditionalNode {
  pub fn from_def(def: &NodeDef) -> Result<Self, RuntimeError> {
    let operator = match def.config_str("operator") {
      None | Some("") | Some("equals") => Operator::Equals,
      Some("contains") => Operator::Contains,
      Some(other) => {
        return Err(invalid_definition(
          def,
          format!("unsupported operator '{}', expected 'equals' or 'contains'", other),
        ));
      }
    };

    let value = match def.config.get("value") {
      None | Some(Value::Null) => String::new(),
      Some(v) => text_form(v),
    };

    Ok(Self {
      id: def.id.clone(),
      operator,
      value,
    })
  }

  fn evaluate(&self, input: &str) -> bool {
    match self.operator {
      Operator::Equals => input == self.value,
      Operator::Contains => input.contains(&self.value),
    }
  }
}

#[async_trait]
impl Node for ConditionalNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Conditional
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let input = text_form(ctx.require_input("input")?);
    let result = self.evaluate(&input);

    Ok(Outputs::from([
      ("result".to_string(), Value::Bool(result)),
      (BRANCH_KEY.to_string(), Value::String(result.to_string())),
    ]))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn node(config: Value) -> Result<ConditionalNode, RuntimeError> {
    let mut def = NodeDef::new("check", NodeKind::Conditional);
    if let Value::Object(map) = config {
      def.config = map;
    }
    ConditionalNode::from_def(&def)
  }

  #[test]
  fn test_default_operator_is_equals() {
    let n = node(json!({"value": "a"})).unwrap();
    assert!(n.evaluate("a"));
    assert!(!n.evaluate("abc"));
  }

  #[test]
  fn test_contains() {
    let n = node(json!({"operator": "contains", "value": "err"})).unwrap();
    assert!(n.evaluate("an error occurred"));
    assert!(!n.evaluate("fine"));
  }

  #[test]
  fn test_non_string_literal() {
    let n = node(json!({"value": 3})).unwrap();
    assert!(n.evaluate("3"));
  }

  #[test]
  fn test_unknown_operator_rejected() {
    let err = node(json!({"operator": "matches", "value": "x"})).err().unwrap();
    assert!(matches!(err, RuntimeError::Definition { ref node_id, .. } if node_id == "check"));
  }
}
