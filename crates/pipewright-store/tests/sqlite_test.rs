//! Integration tests for the SQLite checkpoint backend.

use pipewright_store::{Checkpointer, Error, Snapshot, SqliteCheckpointer};
use serde_json::json;

async fn open_store(dir: &tempfile::TempDir) -> SqliteCheckpointer {
  SqliteCheckpointer::open(dir.path().join("checkpoints.db"))
    .await
    .expect("failed to open checkpoint db")
}

#[tokio::test]
async fn test_save_and_load_roundtrip() {
  let dir = tempfile::tempdir().unwrap();
  let store = open_store(&dir).await;

  let snapshot = Snapshot::from([
    ("final_answer".to_string(), json!("done")),
    ("items".to_string(), json!([1, 2, 3])),
  ]);
  store.save("thread-a", &snapshot).await.unwrap();

  assert_eq!(store.load("thread-a").await.unwrap(), snapshot);
}

#[tokio::test]
async fn test_load_unknown_thread() {
  let dir = tempfile::tempdir().unwrap();
  let store = open_store(&dir).await;

  let err = store.load("missing").await.unwrap_err();
  assert!(matches!(err, Error::ThreadNotFound(ref id) if id == "missing"));
}

#[tokio::test]
async fn test_save_overwrites_thread() {
  let dir = tempfile::tempdir().unwrap();
  let store = open_store(&dir).await;

  store
    .save("t", &Snapshot::from([("v".to_string(), json!(1))]))
    .await
    .unwrap();
  let first = store.updated_at("t").await.unwrap();

  store
    .save("t", &Snapshot::from([("v".to_string(), json!(2))]))
    .await
    .unwrap();

  assert_eq!(store.load("t").await.unwrap()["v"], json!(2));
  assert!(store.updated_at("t").await.unwrap() >= first);
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();

  {
    let store = open_store(&dir).await;
    store
      .save("durable", &Snapshot::from([("k".to_string(), json!({"nested": true}))]))
      .await
      .unwrap();
  }

  let reopened = open_store(&dir).await;
  assert_eq!(
    reopened.load("durable").await.unwrap()["k"],
    json!({"nested": true})
  );
}

#[tokio::test]
async fn test_threads_are_independent() {
  let dir = tempfile::tempdir().unwrap();
  let store = open_store(&dir).await;

  store
    .save("one", &Snapshot::from([("x".to_string(), json!(1))]))
    .await
    .unwrap();
  store.save("two", &Snapshot::new()).await.unwrap();

  assert_eq!(store.load("one").await.unwrap().len(), 1);
  assert!(store.load("two").await.unwrap().is_empty());
}
