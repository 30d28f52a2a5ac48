use std::collections::{HashMap, HashSet};

use pipewright_config::{NodeDef, PipelineDef};

use crate::error::GraphError;
use crate::graph::Graph;

/// A validated pipeline ready for scheduling.
///
/// Node definitions are immutable once validated; the scheduler only reads
/// them.
#[derive(Debug, Clone)]
pub struct Pipeline {
  pub name: String,
  pub version: String,
  nodes: HashMap<String, NodeDef>,
  graph: Graph,
}

impl Pipeline {
  /// Validate a definition and build its graph.
  ///
  /// Checks, in order: at least one node, unique ids, edges reference known
  /// nodes, and no cycles.
  pub fn from_def(def: PipelineDef) -> Result<Self, GraphError> {
    if def.nodes.is_empty() {
      return Err(GraphError::Empty);
    }

    let mut seen = HashSet::new();
    for node in &def.nodes {
      if !seen.insert(node.id.as_str()) {
        return Err(GraphError::DuplicateNode {
          node_id: node.id.clone(),
        });
      }
    }

    for edge in &def.edges {
      for endpoint in [&edge.source, &edge.target] {
        if !seen.contains(endpoint.as_str()) {
          return Err(GraphError::DanglingEdge {
            from: edge.source.clone(),
            to: edge.target.clone(),
            node_id: endpoint.clone(),
          });
        }
      }
    }

    let graph = Graph::new(def.nodes.iter().map(|n| n.id.as_str()), &def.edges);
    graph
      .topological_order()
      .map_err(|nodes| GraphError::Cycle { nodes })?;

    let nodes = def
      .nodes
      .into_iter()
      .map(|node| (node.id.clone(), node))
      .collect();

    Ok(Self {
      name: def.name,
      version: def.version,
      nodes,
      graph,
    })
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.nodes.get(node_id)
  }

  /// Nodes in definition order.
  pub fn nodes(&self) -> impl Iterator<Item = &NodeDef> {
    self
      .graph
      .nodes()
      .iter()
      .filter_map(|id| self.nodes.get(id))
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
