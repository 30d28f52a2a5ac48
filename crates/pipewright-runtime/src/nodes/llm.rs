use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::NodeError;
use crate::node::{Node, NodeContext, Outputs};
use crate::nodes::http::send;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Sends the `prompt` input to an OpenAI-compatible chat completions API.
///
/// When the API key variable is unset the node answers with a fixed mock
/// response instead of calling out. Emits `response`.
pub struct LlmNode {
  id: String,
  model: String,
  system: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
  #[serde(default)]
  content: String,
}

impl LlmNode {
  pub fn from_def(def: &NodeDef) -> Self {
    Self {
      id: def.id.clone(),
      model: def
        .config_str("model")
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODEL)
        .to_string(),
      system: def.config_str("system").map(str::to_string),
    }
  }

  fn mock_response(&self, prompt: &str) -> String {
    format!("Mock response (No Key) from {}: {}", self.model, prompt)
  }
}

#[async_trait]
impl Node for LlmNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Llm
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let prompt = ctx.input_text("prompt").unwrap_or_default();
    let config = ctx.engine.config();

    let api_key = std::env::var(&config.openai_api_key_env)
      .ok()
      .filter(|key| !key.is_empty());

    let Some(api_key) = api_key else {
      warn!(
        node_id = %self.id,
        env = %config.openai_api_key_env,
        "api key not set, using mock response"
      );
      return Ok(Outputs::from([(
        "response".to_string(),
        Value::String(self.mock_response(&prompt)),
      )]));
    };

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &self.system {
      messages.push(ChatMessage {
        role: "system",
        content: system,
      });
    }
    messages.push(ChatMessage {
      role: "user",
      content: &prompt,
    });

    info!(
      run_id = %ctx.run_id,
      node_id = %self.id,
      model = %self.model,
      "llm request"
    );

    let url = format!(
      "{}/chat/completions",
      config.openai_base_url.trim_end_matches('/')
    );
    let request = ctx
      .engine
      .http()
      .post(url)
      .bearer_auth(api_key)
      .json(&ChatRequest {
        model: &self.model,
        messages,
      });

    let response = send(request, &ctx.cancel).await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(NodeError::Upstream {
        status: status.as_u16(),
        body,
      });
    }

    let parsed: ChatResponse = response.json().await?;
    let content = parsed
      .choices
      .into_iter()
      .next()
      .map(|choice| choice.message.content)
      .ok_or_else(|| NodeError::failed("no choices returned from model"))?;

    Ok(Outputs::from([(
      "response".to_string(),
      Value::String(content),
    )]))
  }
}
