//! Pipewright Memory
//!
//! Hierarchical key/value state shared by the nodes of a run.
//!
//! A [`MemoryScope`] owns only its own bindings. Reads fall back to the
//! parent chain; writes always land in the local scope. Iteration nodes hand
//! each sub-run a fresh child scope so that sibling instances never observe
//! each other's writes.
//!
//! Each scope has its own lock. Writers to different scopes never contend,
//! and no operation removes a key.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

struct ScopeInner {
  bindings: RwLock<HashMap<String, Value>>,
  parent: Option<MemoryScope>,
}

/// A node in the memory tree.
///
/// Cloning a `MemoryScope` yields another handle to the same scope, not a
/// copy of its bindings. Use [`MemoryScope::child`] for an isolated layer.
#[derive(Clone)]
pub struct MemoryScope {
  inner: Arc<ScopeInner>,
}

impl MemoryScope {
  /// Create a root scope.
  pub fn new() -> Self {
    Self::with_parent(None)
  }

  fn with_parent(parent: Option<MemoryScope>) -> Self {
    Self {
      inner: Arc::new(ScopeInner {
        bindings: RwLock::new(HashMap::new()),
        parent,
      }),
    }
  }

  /// Create a child scope whose lookups fall back to `self`.
  pub fn child(&self) -> Self {
    Self::with_parent(Some(self.clone()))
  }

  /// Bind a key in this scope, shadowing any parent binding.
  pub fn set(&self, key: impl Into<String>, value: Value) {
    self
      .inner
      .bindings
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.into(), value);
  }

  /// Bind every entry of `bindings` in this scope.
  pub fn extend(&self, bindings: impl IntoIterator<Item = (String, Value)>) {
    self
      .inner
      .bindings
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .extend(bindings);
  }

  /// Look up a key in this scope, then each ancestor in turn.
  pub fn get(&self, key: &str) -> Option<Value> {
    let mut scope = Some(self);
    while let Some(current) = scope {
      let bindings = current
        .inner
        .bindings
        .read()
        .unwrap_or_else(PoisonError::into_inner);
      if let Some(value) = bindings.get(key) {
        return Some(value.clone());
      }
      scope = current.inner.parent.as_ref();
    }
    None
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Flatten the chain into one map.
  ///
  /// Bindings are merged from the root down, so a child's binding wins over
  /// a same-named binding in any ancestor.
  pub fn get_all(&self) -> HashMap<String, Value> {
    let mut chain = Vec::new();
    let mut scope = Some(self);
    while let Some(current) = scope {
      chain.push(current);
      scope = current.inner.parent.as_ref();
    }

    let mut merged = HashMap::new();
    for current in chain.into_iter().rev() {
      let bindings = current
        .inner
        .bindings
        .read()
        .unwrap_or_else(PoisonError::into_inner);
      merged.extend(bindings.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
  }

  /// Bindings held by this scope alone, ignoring ancestors.
  pub fn local(&self) -> HashMap<String, Value> {
    self
      .inner
      .bindings
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Number of ancestors above this scope.
  pub fn depth(&self) -> usize {
    let mut depth = 0;
    let mut scope = self.inner.parent.as_ref();
    while let Some(parent) = scope {
      depth += 1;
      scope = parent.inner.parent.as_ref();
    }
    depth
  }
}

impl Default for MemoryScope {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for MemoryScope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MemoryScope")
      .field("depth", &self.depth())
      .field("bindings", &self.local())
      .finish()
  }
}
