use std::time::Duration;

use async_trait::async_trait;
use pipewright_config::{NodeDef, NodeKind};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;
use crate::node::{Node, NodeContext, Outputs};

/// Streams the `answer` input to stdout one character at a time.
pub struct AnswerNode {
  id: String,
  delay: Option<Duration>,
}

impl AnswerNode {
  pub fn from_def(def: &NodeDef) -> Self {
    Self {
      id: def.id.clone(),
      delay: def
        .config
        .get("stream_delay_ms")
        .and_then(Value::as_u64)
        .map(Duration::from_millis),
    }
  }
}

#[async_trait]
impl Node for AnswerNode {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> NodeKind {
    NodeKind::Answer
  }

  async fn execute(&self, ctx: NodeContext) -> Result<Outputs, NodeError> {
    let answer = ctx.input_text("answer").unwrap_or_default();
    let config = ctx.engine.config();

    if config.stream_answers {
      let delay = self.delay.unwrap_or(config.answer_stream_delay);
      stream(&mut tokio::io::stdout(), &answer, delay, &ctx.cancel).await?;
    }

    Ok(Outputs::from([("answer".to_string(), Value::String(answer))]))
  }
}

/// Write `text` one character at a time followed by a newline.
async fn stream<W: AsyncWrite + Unpin>(
  out: &mut W,
  text: &str,
  delay: Duration,
  cancel: &CancellationToken,
) -> Result<(), NodeError> {
  let mut buf = [0u8; 4];

  for ch in text.chars() {
    if cancel.is_cancelled() {
      return Err(NodeError::Cancelled);
    }
    out.write_all(ch.encode_utf8(&mut buf).as_bytes()).await?;
    out.flush().await?;
    if !delay.is_zero() {
      tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel.cancelled() => return Err(NodeError::Cancelled),
      }
    }
  }
  out.write_all(b"\n").await?;
  out.flush().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_stream_writes_text_and_newline() {
    let mut out = Vec::new();
    stream(&mut out, "héllo", Duration::ZERO, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(out, "héllo\n".as_bytes());
  }

  #[tokio::test]
  async fn test_stream_reports_write_errors() {
    let (mut writer, reader) = tokio::io::duplex(8);
    drop(reader);
    let err = stream(&mut writer, "hello", Duration::ZERO, &CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(err, NodeError::Output(_)));
  }

  #[tokio::test]
  async fn test_stream_stops_when_cancelled() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut out = Vec::new();
    let err = stream(&mut out, "hello", Duration::ZERO, &cancel)
      .await
      .unwrap_err();
    assert!(matches!(err, NodeError::Cancelled));
    assert!(out.is_empty());
  }
}
