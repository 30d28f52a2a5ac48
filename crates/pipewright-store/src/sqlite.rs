use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use crate::{Checkpointer, Error, Snapshot};

/// SQLite-backed checkpoint storage.
///
/// Each thread is one row; the snapshot is stored as a JSON document.
pub struct SqliteCheckpointer {
  pool: SqlitePool,
}

impl SqliteCheckpointer {
  /// Create a new checkpointer with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) a database file and run migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path.as_ref())
      .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(&self.pool).await
  }

  /// When a thread was last saved.
  pub async fn updated_at(&self, thread_id: &str) -> Result<DateTime<Utc>, Error> {
    let row: Option<(DateTime<Utc>,)> =
      sqlx::query_as("SELECT updated_at FROM checkpoints WHERE thread_id = ?")
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

    row
      .map(|(updated_at,)| updated_at)
      .ok_or_else(|| Error::ThreadNotFound(thread_id.to_string()))
  }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
  async fn save(&self, thread_id: &str, snapshot: &Snapshot) -> Result<(), Error> {
    let state = serde_json::to_string(snapshot).map_err(|source| Error::Serialization {
      thread_id: thread_id.to_string(),
      source,
    })?;

    sqlx::query(
      r#"
            INSERT INTO checkpoints (thread_id, state, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
    )
    .bind(thread_id)
    .bind(state)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn load(&self, thread_id: &str) -> Result<Snapshot, Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT state FROM checkpoints WHERE thread_id = ?")
      .bind(thread_id)
      .fetch_optional(&self.pool)
      .await?;

    let (state,) = row.ok_or_else(|| Error::ThreadNotFound(thread_id.to_string()))?;

    serde_json::from_str(&state).map_err(|source| Error::Serialization {
      thread_id: thread_id.to_string(),
      source,
    })
  }
}
