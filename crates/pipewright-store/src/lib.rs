//! Pipewright Store
//!
//! This crate provides the checkpoint storage trait and its implementations.
//! A checkpoint is a flat key/value snapshot saved under a named thread id.
//! It is independent of any single run's memory tree and is only touched by
//! explicit [`Checkpointer::save`] and [`Checkpointer::load`] calls.
//!
//! Implementations:
//! - [`InMemoryCheckpointer`] for tests and single-process use
//! - [`SqliteCheckpointer`] for snapshots that outlive the process

mod memory;
mod sqlite;

pub use memory::InMemoryCheckpointer;
pub use sqlite::SqliteCheckpointer;

use std::collections::HashMap;

use async_trait::async_trait;

/// A flat key/value snapshot.
pub type Snapshot = HashMap<String, serde_json::Value>;

/// Error type for checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// No snapshot has been saved under this thread id.
  #[error("thread not found: {0}")]
  ThreadNotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Schema migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  /// A stored snapshot could not be encoded or decoded.
  #[error("invalid snapshot for thread '{thread_id}': {source}")]
  Serialization {
    thread_id: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Storage for named checkpoint threads.
///
/// Implementations store and return independent copies: mutating a map
/// after `save`, or a map returned from `load`, never changes stored state.
#[async_trait]
pub trait Checkpointer: Send + Sync {
  /// Create or overwrite the snapshot for a thread.
  async fn save(&self, thread_id: &str, snapshot: &Snapshot) -> Result<(), Error>;

  /// Load the snapshot for a thread.
  async fn load(&self, thread_id: &str) -> Result<Snapshot, Error>;
}
