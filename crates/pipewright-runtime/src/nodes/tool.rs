use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{NodeError, RuntimeError};
use crate::node::{Node, NodeContext, Outputs};
use crate::nodes::code::run_script;
use crate::nodes::http::send;
use crate::nodes::invalid_definition;
use crate::template::text_form;

const MAX_SEARCH_RESULTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
  /// Evaluates the `expression` input as arithmetic.
  Calculator,
  /// Web search through SerpApi for the `query` input.
  GoogleSearch,
}

/// Invokes one of a fixed set of tools selected by `config.tool_id`.
///
/// Every tool emits its answer as `text`.
pub struct ToolNode {
  id: String,
  tool: Tool,
}

#[derive(Deserialize)]
struct SearchResponse {
  #[serde(default)]
  organic_results: Vec<SearchResult>,
  #[serde(default)]
  error: Option<String>,
}

#[derive(Deserialize)]
struct SearchResult {
  #[serde(default)]
  title: String,
  #[serde(default)]
  snippet: String,
}

impl ToolNode {
  pub fn from_def(def: &NodeDef) -> Result<Self, RuntimeError> {
    let tool = match def.config_str("tool_id") {
      Some("calculator") => Tool::Calculator,
      Some("google_search") => Tool::GoogleSearch,
      Some(other) => return Err(invalid_definition(def, format!("unknown tool: {}", other))),
      None => return Err(invalid_definition(def, "missing 'tool_id' config")),
    };

    Ok(Self {
      id: def.id.clone(),
      tool,
    })
  }

  async fn calculate(&self, ctx: &NodeContext) -> Result<Outputs, NodeError> {
    let expression = required_text(ctx, "expression")?;

    // Arithmetic only: the sandbox sees no inputs.
    let value = run_script(
      format!("return ({})", expression),
      Outputs::new(),
      ctx.cancel.clone(),
    )
    .await?;

    info!(node_id = %self.id, expression = %expression, result = %value, "calculated");
    Ok(text_output(text_form(&value)))
  }

  async fn search(&self, ctx: &NodeContext) -> Result<Outputs, NodeError> {
    let query = required_text(ctx, "query")?;
    let config = ctx.engine.config();

    let api_key = std::env::var(&config.serpapi_api_key_env)
      .ok()
      .filter(|key| !key.is_empty());

    let Some(api_key) = api_key else {
      warn!(
        node_id = %self.id,
        env = %config.serpapi_api_key_env,
        "api key not set, using mock search results"
      );
      return Ok(text_output(format!(
        "Mock Search Results for '{}': [Real Search requires API Key]",
        query
      )));
    };

    let request = ctx.engine.http().get(&config.serpapi_url).query(&[
      ("q", query.as_str()),
      ("api_key", api_key.as_str()),
      ("engine", "google"),
    ]);

    let response: SearchResponse = send(request, &ctx.cancel).await?.json().await?;
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
      return Err(NodeError::failed(format!("search failed: {}", error)));
    }

    Ok(text_output(format_results(&response.organic_results)))
  }
}

#[async_trait]
impl Node for ToolNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Tool
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    match self.tool {
      Tool::Calculator => self.calculate(&ctx).await,
      Tool::GoogleSearch => self.search(&ctx).await,
    }
  }
}

fn required_text(ctx: &NodeContext, name: &str) -> Result<String, NodeError> {
  ctx
    .input_text(name)
    .filter(|s| !s.trim().is_empty())
    .ok_or_else(|| NodeError::MissingInput {
      input: name.to_string(),
    })
}

fn text_output(text: String) -> Outputs {
  Outputs::from([("text".to_string(), Value::String(text))])
}

fn format_results(results: &[SearchResult]) -> String {
  if results.is_empty() {
    return "No results found.".to_string();
  }
  results
    .iter()
    .take(MAX_SEARCH_RESULTS)
    .enumerate()
    .map(|(i, r)| format!("{}. {}: {}\n", i + 1, r.title, r.snippet))
    .collect()
}
