//! Per-run table of node outputs.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::node::Outputs;

/// Outputs recorded by completed nodes, keyed by node id.
///
/// Each node's entry is written once, after its task finishes, so readers
/// either see a node's complete outputs or nothing. Entries are sharded, so
/// recording one node does not block lookups of another.
#[derive(Clone, Default)]
pub struct OutputTable {
  inner: Arc<DashMap<String, Arc<Outputs>>>,
}

impl OutputTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a node's outputs.
  ///
  /// Returns `false` and leaves the table unchanged if the node already has
  /// an entry.
  pub fn record(&self, node_id: &str, outputs: Outputs) -> bool {
    match self.inner.entry(node_id.to_string()) {
      Entry::Occupied(_) => false,
      Entry::Vacant(slot) => {
        slot.insert(Arc::new(outputs));
        true
      }
    }
  }

  pub fn get(&self, node_id: &str) -> Option<Arc<Outputs>> {
    self.inner.get(node_id).map(|entry| entry.value().clone())
  }

  /// Copy the table out as plain maps.
  pub fn snapshot(&self) -> HashMap<String, Outputs> {
    self
      .inner
      .iter()
      .map(|entry| (entry.key().clone(), entry.value().as_ref().clone()))
      .collect()
  }
}
