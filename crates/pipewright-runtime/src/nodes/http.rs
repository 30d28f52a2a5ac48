use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{NodeError, RuntimeError};
use crate::node::{Node, NodeContext, Outputs};
use crate::nodes::invalid_definition;

/// Performs one HTTP request.
///
/// `config.method` defaults to GET. The `url` input overrides `config.url`,
/// and a `body` input is sent as JSON. Emits `status_code` and `body`; a
/// JSON response body is parsed, anything else is returned as text.
pub struct HttpRequestNode {
  id: String,
  method: Method,
  url: Option<String>,
}

impl HttpRequestNode {
  pub fn from_def(def: &NodeDef) -> Result<Self, RuntimeError> {
    let method = parse_method(def.config_str("method").unwrap_or("GET"))
      .ok_or_else(|| invalid_definition(def, "unsupported HTTP method"))?;

    Ok(Self {
      id: def.id.clone(),
      method,
      url: def.config_str("url").map(str::to_string),
    })
  }
}

#[async_trait]
impl Node for HttpRequestNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::HttpRequest
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let url = ctx
      .input_text("url")
      .or_else(|| self.url.clone())
      .ok_or_else(|| NodeError::MissingInput {
        input: "url".to_string(),
      })?;

    let url = url::Url::parse(&url).map_err(|e| NodeError::InvalidInput {
      input: "url".to_string(),
      message: e.to_string(),
    })?;

    info!(
      run_id = %ctx.run_id,
      node_id = %self.id,
      method = %self.method,
      url = %url,
      "http request"
    );

    let mut request = ctx.engine.http().request(self.method.clone(), url);
    if let Some(body) = ctx.input("body") {
      request = request.json(body);
    }

    let response = send(request, &ctx.cancel).await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    Ok(Outputs::from([
      ("status_code".to_string(), Value::from(status)),
      ("body".to_string(), body),
    ]))
  }
}

/// Send a request, giving up as soon as the run is cancelled.
pub(crate) async fn send(
  request: RequestBuilder,
  cancel: &CancellationToken,
) -> Result<Response, NodeError> {
  tokio::select! {
    response = request.send() => Ok(response?),
    _ = cancel.cancelled() => Err(NodeError::Cancelled),
  }
}

fn parse_method(method: &str) -> Option<Method> {
  match method.to_uppercase().as_str() {
    "GET" => Some(Method::GET),
    "POST" => Some(Method::POST),
    "PUT" => Some(Method::PUT),
    "DELETE" => Some(Method::DELETE),
    "PATCH" => Some(Method::PATCH),
    "HEAD" => Some(Method::HEAD),
    "OPTIONS" => Some(Method::OPTIONS),
    _ => None,
  }
}
