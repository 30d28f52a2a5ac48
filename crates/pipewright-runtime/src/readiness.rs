//! Per-edge readiness tracking.
//!
//! Every edge starts `Pending` and resolves exactly once, to `Active` or
//! `Skipped`. A node leaves `Pending` only when its last incoming edge
//! resolves: it becomes `Ready` if any incoming edge was active, otherwise
//! `Skipped`, and a skipped node resolves all of its own outgoing edges as
//! skipped. A join therefore waits for every parent, however slow, before
//! its fate is decided.

use std::collections::{HashMap, HashSet};

use pipewright_workflow::{EdgeId, Graph};
use serde::Serialize;

/// Lifecycle of a node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  /// Waiting for incoming edges to resolve.
  Pending,
  /// All incoming edges resolved and at least one is active.
  Ready,
  Running,
  Completed,
  /// No incoming edge resolved active.
  Skipped,
  Failed,
}

impl NodeState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      NodeState::Completed | NodeState::Skipped | NodeState::Failed
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
  Pending,
  Active,
  Skipped,
}

/// Nodes whose state changed as a result of one completion.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Transition {
  pub ready: Vec<String>,
  pub skipped: Vec<String>,
}

pub(crate) struct Readiness<'g> {
  graph: &'g Graph,
  edges: Vec<EdgeState>,
  pending_incoming: HashMap<String, usize>,
  has_active_incoming: HashSet<String>,
  states: HashMap<String, NodeState>,
}

impl<'g> Readiness<'g> {
  /// Start tracking a graph. Entry points begin `Ready`.
  pub fn new(graph: &'g Graph) -> Self {
    let pending_incoming: HashMap<String, usize> = graph
      .nodes()
      .iter()
      .map(|id| (id.clone(), graph.incoming(id).len()))
      .collect();

    let states = graph
      .nodes()
      .iter()
      .map(|id| {
        let state = if pending_incoming[id] == 0 {
          NodeState::Ready
        } else {
          NodeState::Pending
        };
        (id.clone(), state)
      })
      .collect();

    Self {
      graph,
      edges: vec![EdgeState::Pending; graph.edges().len()],
      pending_incoming,
      has_active_incoming: HashSet::new(),
      states,
    }
  }

  pub fn initial_ready(&self) -> Vec<String> {
    self.graph.entry_points().to_vec()
  }

  pub fn state(&self, node_id: &str) -> Option<NodeState> {
    self.states.get(node_id).copied()
  }

  pub fn states(&self) -> &HashMap<String, NodeState> {
    &self.states
  }

  pub fn mark_running(&mut self, node_id: &str) {
    self.set_state(node_id, NodeState::Running);
  }

  /// Mark a node completed without resolving its outgoing edges.
  pub fn mark_completed(&mut self, node_id: &str) {
    self.set_state(node_id, NodeState::Completed);
  }

  pub fn mark_failed(&mut self, node_id: &str) {
    self.set_state(node_id, NodeState::Failed);
  }

  /// Mark a node completed and resolve its outgoing edges against the
  /// branch selector it emitted.
  pub fn complete(&mut self, node_id: &str, selector: &str) -> Transition {
    self.set_state(node_id, NodeState::Completed);

    let mut transition = Transition::default();
    let mut worklist: Vec<(EdgeId, EdgeState)> = self
      .graph
      .outgoing(node_id)
      .iter()
      .map(|&edge_id| {
        let state = if self.graph.edge(edge_id).handle == selector {
          EdgeState::Active
        } else {
          EdgeState::Skipped
        };
        (edge_id, state)
      })
      .collect();

    while let Some((edge_id, state)) = worklist.pop() {
      if self.edges[edge_id] != EdgeState::Pending {
        continue;
      }
      self.edges[edge_id] = state;

      let target = self.graph.edge(edge_id).target.clone();
      if state == EdgeState::Active {
        self.has_active_incoming.insert(target.clone());
      }

      let Some(remaining) = self.pending_incoming.get_mut(&target) else {
        continue;
      };
      *remaining -= 1;
      if *remaining > 0 {
        continue;
      }

      if self.has_active_incoming.contains(&target) {
        self.set_state(&target, NodeState::Ready);
        transition.ready.push(target);
      } else {
        self.set_state(&target, NodeState::Skipped);
        worklist.extend(
          self
            .graph
            .outgoing(&target)
            .iter()
            .map(|&edge_id| (edge_id, EdgeState::Skipped)),
        );
        transition.skipped.push(target);
      }
    }

    transition
  }

  /// Whether every node is completed or skipped.
  pub fn is_finished(&self) -> bool {
    self
      .states
      .values()
      .all(|s| matches!(s, NodeState::Completed | NodeState::Skipped))
  }

  /// Nodes that have not reached a terminal state, in definition order.
  pub fn unresolved(&self) -> Vec<String> {
    self
      .graph
      .nodes()
      .iter()
      .filter(|id| !self.states[*id].is_terminal())
      .cloned()
      .collect()
  }

  fn set_state(&mut self, node_id: &str, state: NodeState) {
    if let Some(current) = self.states.get_mut(node_id) {
      *current = state;
    }
  }
}

#[cfg(test)]
mod tests {
  use pipewright_config::EdgeDef;

  use super::*;

  fn graph(nodes: &[&str], edges: Vec<EdgeDef>) -> Graph {
    Graph::new(nodes.iter().copied(), &edges)
  }

  fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
  }

  #[test]
  fn test_linear_chain() {
    let g = graph(
      &["a", "b", "c"],
      vec![EdgeDef::new("a", "b"), EdgeDef::new("b", "c")],
    );
    let mut r = Readiness::new(&g);

    assert_eq!(r.initial_ready(), vec!["a"]);
    assert_eq!(r.state("b"), Some(NodeState::Pending));

    assert_eq!(r.complete("a", "").ready, vec!["b"]);
    assert_eq!(r.complete("b", "").ready, vec!["c"]);
    assert!(r.complete("c", "").ready.is_empty());
    assert!(r.is_finished());
  }

  #[test]
  fn test_branch_skips_other_subtree() {
    let g = graph(
      &["check", "yes", "yes_2", "no", "no_2"],
      vec![
        EdgeDef::with_handle("check", "yes", "true"),
        EdgeDef::with_handle("check", "no", "false"),
        EdgeDef::new("yes", "yes_2"),
        EdgeDef::new("no", "no_2"),
      ],
    );
    let mut r = Readiness::new(&g);

    let t = r.complete("check", "true");
    assert_eq!(t.ready, vec!["yes"]);
    assert_eq!(sorted(t.skipped), vec!["no", "no_2"]);
    assert_eq!(r.state("no_2"), Some(NodeState::Skipped));

    r.complete("yes", "");
    r.complete("yes_2", "");
    assert!(r.is_finished());
  }

  #[test]
  fn test_unconditional_edge_skipped_when_selector_set() {
    let g = graph(&["check", "next"], vec![EdgeDef::new("check", "next")]);
    let mut r = Readiness::new(&g);

    let t = r.complete("check", "false");
    assert_eq!(t.skipped, vec!["next"]);
  }

  #[test]
  fn test_join_waits_for_slow_active_parent() {
    // check -true-> fast -> join
    // check -false-> dead -> join
    // start -> slow -> join
    let g = graph(
      &["start", "check", "dead", "slow", "join"],
      vec![
        EdgeDef::new("start", "check"),
        EdgeDef::new("start", "slow"),
        EdgeDef::with_handle("check", "dead", "true"),
        EdgeDef::new("dead", "join"),
        EdgeDef::new("slow", "join"),
      ],
    );
    let mut r = Readiness::new(&g);

    let t = r.complete("start", "");
    assert_eq!(sorted(t.ready), vec!["check", "slow"]);

    // The skip path resolves first; the join must stay pending.
    let t = r.complete("check", "false");
    assert_eq!(t.skipped, vec!["dead"]);
    assert_eq!(r.state("join"), Some(NodeState::Pending));

    let t = r.complete("slow", "");
    assert_eq!(t.ready, vec!["join"]);
  }

  #[test]
  fn test_join_skipped_when_all_parents_skipped() {
    let g = graph(
      &["check", "a", "b", "join"],
      vec![
        EdgeDef::with_handle("check", "a", "x"),
        EdgeDef::with_handle("check", "b", "y"),
        EdgeDef::new("a", "join"),
        EdgeDef::new("b", "join"),
      ],
    );
    let mut r = Readiness::new(&g);

    let t = r.complete("check", "z");
    assert_eq!(sorted(t.skipped), vec!["a", "b", "join"]);
    assert!(r.is_finished());
    assert!(r.unresolved().is_empty());
  }

  #[test]
  fn test_reconverging_branches_join_runs() {
    let g = graph(
      &["check", "yes", "no", "merge"],
      vec![
        EdgeDef::with_handle("check", "yes", "true"),
        EdgeDef::with_handle("check", "no", "false"),
        EdgeDef::new("yes", "merge"),
        EdgeDef::new("no", "merge"),
      ],
    );
    let mut r = Readiness::new(&g);

    r.complete("check", "false");
    let t = r.complete("no", "");
    assert_eq!(t.ready, vec!["merge"]);
    assert_eq!(r.state("yes"), Some(NodeState::Skipped));
  }

  #[test]
  fn test_unresolved_lists_non_terminal_nodes() {
    let g = graph(&["a", "b"], vec![EdgeDef::new("a", "b")]);
    let mut r = Readiness::new(&g);
    r.mark_running("a");
    assert_eq!(r.unresolved(), vec!["a", "b"]);
    r.mark_failed("a");
    assert_eq!(r.unresolved(), vec!["b"]);
  }
}
