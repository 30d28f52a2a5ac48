use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Checkpointer, Error, Snapshot};

/// Checkpoints held in process memory.
#[derive(Default)]
pub struct InMemoryCheckpointer {
  threads: RwLock<HashMap<String, Snapshot>>,
}

impl InMemoryCheckpointer {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
  async fn save(&self, thread_id: &str, snapshot: &Snapshot) -> Result<(), Error> {
    self
      .threads
      .write()
      .await
      .insert(thread_id.to_string(), snapshot.clone());
    Ok(())
  }

  async fn load(&self, thread_id: &str) -> Result<Snapshot, Error> {
    self
      .threads
      .read()
      .await
      .get(thread_id)
      .cloned()
      .ok_or_else(|| Error::ThreadNotFound(thread_id.to_string()))
  }
}
