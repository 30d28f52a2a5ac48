use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a pipeline definition.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read definition file {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON definition: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid YAML definition: {0}")]
  Yaml(#[from] serde_yaml_ng::Error),
}
