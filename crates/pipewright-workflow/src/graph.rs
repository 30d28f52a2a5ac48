use std::collections::{HashMap, HashSet, VecDeque};

use pipewright_config::EdgeDef;

/// Index of an edge within a [`Graph`].
pub type EdgeId = usize;

/// An edge as the scheduler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
  pub source: String,
  pub target: String,
  /// Branch handle; empty means unconditional.
  pub handle: String,
}

/// Graph structure for traversal and analysis.
///
/// Edges are stored once and referenced by [`EdgeId`] from both the
/// outgoing and incoming indexes, so per-edge state can be tracked in a
/// flat vector.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Node ids in definition order.
  nodes: Vec<String>,
  edges: Vec<GraphEdge>,
  /// node_id -> outgoing edge ids.
  outgoing: HashMap<String, Vec<EdgeId>>,
  /// node_id -> incoming edge ids.
  incoming: HashMap<String, Vec<EdgeId>>,
  /// Nodes with no incoming edges.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from node ids and edges.
  ///
  /// Edges referencing unknown nodes are indexed anyway; validation happens
  /// in [`crate::Pipeline::from_def`].
  pub fn new<'a>(node_ids: impl IntoIterator<Item = &'a str>, edge_defs: &[EdgeDef]) -> Self {
    let nodes: Vec<String> = node_ids.into_iter().map(str::to_string).collect();
    let mut outgoing: HashMap<String, Vec<EdgeId>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<EdgeId>> = HashMap::new();

    for node_id in &nodes {
      outgoing.entry(node_id.clone()).or_default();
      incoming.entry(node_id.clone()).or_default();
    }

    let mut edges = Vec::with_capacity(edge_defs.len());
    for (id, def) in edge_defs.iter().enumerate() {
      outgoing.entry(def.source.clone()).or_default().push(id);
      incoming.entry(def.target.clone()).or_default().push(id);
      edges.push(GraphEdge {
        source: def.source.clone(),
        target: def.target.clone(),
        handle: def.source_handle.clone(),
      });
    }

    let entry_points: Vec<String> = nodes
      .iter()
      .filter(|id| incoming.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    Self {
      nodes,
      edges,
      outgoing,
      incoming,
      entry_points,
    }
  }

  /// Node ids in definition order.
  pub fn nodes(&self) -> &[String] {
    &self.nodes
  }

  pub fn edges(&self) -> &[GraphEdge] {
    &self.edges
  }

  pub fn edge(&self, id: EdgeId) -> &GraphEdge {
    &self.edges[id]
  }

  /// Get entry points (nodes with no incoming edges).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Outgoing edge ids for a node.
  pub fn outgoing(&self, node_id: &str) -> &[EdgeId] {
    self
      .outgoing
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Incoming edge ids for a node.
  pub fn incoming(&self, node_id: &str) -> &[EdgeId] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Order nodes so every edge points forward.
  ///
  /// Uses Kahn's algorithm, which mirrors the scheduler's readiness rule: a
  /// node is emitted once all of its incoming edges are resolved. Nodes that
  /// can never be emitted sit on a cycle and are returned as the error.
  pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
    let mut remaining: HashMap<&str, usize> = self
      .nodes
      .iter()
      .map(|id| (id.as_str(), self.incoming(id).len()))
      .collect();

    let mut queue: VecDeque<&str> = self.entry_points.iter().map(String::as_str).collect();
    let mut order = Vec::with_capacity(self.nodes.len());

    while let Some(node_id) = queue.pop_front() {
      order.push(node_id.to_string());
      for &edge_id in self.outgoing(node_id) {
        let target = self.edges[edge_id].target.as_str();
        if let Some(count) = remaining.get_mut(target) {
          *count -= 1;
          if *count == 0 {
            queue.push_back(target);
          }
        }
      }
    }

    if order.len() == self.nodes.len() {
      return Ok(order);
    }

    let emitted: HashSet<&str> = order.iter().map(String::as_str).collect();
    Err(
      self
        .nodes
        .iter()
        .filter(|id| !emitted.contains(id.as_str()))
        .cloned()
        .collect(),
    )
  }
}
