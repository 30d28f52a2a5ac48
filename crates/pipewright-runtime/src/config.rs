//! Runtime configuration.

use std::time::Duration;

/// Settings shared by every node of a run, including nested iteration runs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Upper bound on a single node's execution when the node sets no
  /// `timeout_ms` of its own. `None` means unbounded.
  pub default_node_timeout: Option<Duration>,
  /// How long a node may keep running after its run is cancelled before
  /// it is dropped.
  pub cancel_grace: Duration,
  /// Delay between characters when an answer node streams to stdout.
  pub answer_stream_delay: Duration,
  /// Whether answer nodes write to stdout at all.
  pub stream_answers: bool,
  /// Request timeout for the shared HTTP client.
  pub http_timeout: Duration,
  /// Base URL of an OpenAI-compatible API.
  pub openai_base_url: String,
  /// Environment variable holding the LLM API key.
  pub openai_api_key_env: String,
  pub serpapi_url: String,
  pub serpapi_api_key_env: String,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      default_node_timeout: None,
      cancel_grace: Duration::from_millis(250),
      answer_stream_delay: Duration::from_millis(10),
      stream_answers: true,
      http_timeout: Duration::from_secs(30),
      openai_base_url: "https://api.openai.com/v1".to_string(),
      openai_api_key_env: "OPENAI_API_KEY".to_string(),
      serpapi_url: "https://serpapi.com/search".to_string(),
      serpapi_api_key_env: "SERPAPI_API_KEY".to_string(),
    }
  }
}
