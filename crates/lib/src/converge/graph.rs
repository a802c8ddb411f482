//! Service dependency graph.
//!
//! Services are nodes in a [`DiGraph`] arena; an edge runs from a dependency to
//! its dependent, so for `web` with `depends_on: [db]` the edge is `db -> web`.
//! Both `depends_on` and `links` produce edges.
//!
//! Node indices follow declaration order, and every traversal breaks ties by
//! index, so all orders are deterministic.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::project::{ConfigError, Project};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// The dependency DAG of a project, or of a selected part of it.
#[derive(Debug, Clone)]
pub struct ServiceGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl ServiceGraph {
  /// Build and validate the graph for a project.
  ///
  /// # Errors
  ///
  /// - `UnknownDependency` if an edge names a service outside the project
  /// - `CyclicDependency` naming the cycle, e.g. `web -> db -> web`
  pub fn build(project: &Project) -> Result<Self, ConfigError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for service in project.services() {
      let idx = graph.add_node(service.name.clone());
      nodes.insert(service.name.clone(), idx);
    }

    for service in project.services() {
      let dependent = nodes[&service.name];
      for dep in service.dependencies() {
        let Some(&dependency) = nodes.get(dep) else {
          return Err(ConfigError::UnknownDependency {
            service: service.name.clone(),
            dependency: dep.to_string(),
          });
        };
        graph.add_edge(dependency, dependent, ());
      }
    }

    let built = Self { graph, nodes };

    if let Some(cycle) = built.find_cycle() {
      return Err(ConfigError::CyclicDependency { cycle });
    }

    debug!(
      services = built.graph.node_count(),
      edges = built.graph.edge_count(),
      "built service graph"
    );

    Ok(built)
  }

  /// Depth-first search with three-colour marking.
  ///
  /// Walks from each service to its dependencies; reaching a service that is
  /// still in progress closes a cycle, reported from that service back to
  /// itself.
  fn find_cycle(&self) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
    let mut path = Vec::new();

    for start in self.graph.node_indices() {
      if marks[start.index()] == Mark::Unvisited
        && let Some(cycle) = self.visit(start, &mut marks, &mut path)
      {
        return Some(cycle);
      }
    }
    None
  }

  fn visit(&self, node: NodeIndex, marks: &mut [Mark], path: &mut Vec<NodeIndex>) -> Option<Vec<String>> {
    marks[node.index()] = Mark::InProgress;
    path.push(node);

    for dep in self.neighbors(node, Direction::Incoming) {
      match marks[dep.index()] {
        Mark::InProgress => {
          let start = path.iter().position(|&n| n == dep)?;
          let mut cycle: Vec<String> = path[start..].iter().map(|&n| self.graph[n].clone()).collect();
          cycle.push(self.graph[dep].clone());
          return Some(cycle);
        }
        Mark::Unvisited => {
          if let Some(cycle) = self.visit(dep, marks, path) {
            return Some(cycle);
          }
        }
        Mark::Done => {}
      }
    }

    path.pop();
    marks[node.index()] = Mark::Done;
    None
  }

  /// Neighbors in one direction, in declaration order.
  fn neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
    out.sort_unstable();
    out.dedup();
    out
  }

  fn names(&self, indices: impl IntoIterator<Item = NodeIndex>) -> Vec<String> {
    indices.into_iter().map(|i| self.graph[i].clone()).collect()
  }

  /// Everything reachable from `name` in one direction, excluding `name`.
  fn closure(&self, name: &str, direction: Direction) -> Vec<String> {
    let Some(&start) = self.nodes.get(name) else {
      return Vec::new();
    };

    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
      for next in self.graph.neighbors_directed(node, direction) {
        if seen.insert(next) {
          queue.push_back(next);
        }
      }
    }
    seen.remove(&start);
    self.names(seen)
  }

  /// Topological order, dependencies before dependents.
  pub fn order_for_up(&self) -> Vec<String> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|i| self.neighbors(i, Direction::Incoming).len())
      .collect();

    let mut ready: BTreeSet<NodeIndex> = self.graph.node_indices().filter(|i| in_degree[i.index()] == 0).collect();
    let mut order = Vec::with_capacity(self.graph.node_count());

    while let Some(node) = ready.pop_first() {
      order.push(self.graph[node].clone());
      for dependent in self.neighbors(node, Direction::Outgoing) {
        let degree = &mut in_degree[dependent.index()];
        *degree = degree.saturating_sub(1);
        if *degree == 0 {
          ready.insert(dependent);
        }
      }
    }

    order
  }

  /// Reverse of [`order_for_up`](Self::order_for_up): dependents first.
  pub fn order_for_down(&self) -> Vec<String> {
    let mut order = self.order_for_up();
    order.reverse();
    order
  }

  /// Services that directly depend on `name`.
  pub fn dependents_of(&self, name: &str) -> Vec<String> {
    match self.nodes.get(name) {
      Some(&idx) => self.names(self.neighbors(idx, Direction::Outgoing)),
      None => Vec::new(),
    }
  }

  /// Services `name` directly depends on.
  pub fn dependencies_of(&self, name: &str) -> Vec<String> {
    match self.nodes.get(name) {
      Some(&idx) => self.names(self.neighbors(idx, Direction::Incoming)),
      None => Vec::new(),
    }
  }

  /// Every service downstream of `name`.
  pub fn transitive_dependents_of(&self, name: &str) -> Vec<String> {
    self.closure(name, Direction::Outgoing)
  }

  /// Every service upstream of `name`.
  pub fn transitive_dependencies_of(&self, name: &str) -> Vec<String> {
    self.closure(name, Direction::Incoming)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Service names in declaration order.
  pub fn services(&self) -> Vec<String> {
    self.names(self.graph.node_indices())
  }

  /// The subgraph induced by `keep`. Edges to dropped services disappear.
  pub fn restrict(&self, keep: &BTreeSet<String>) -> Self {
    let graph = self
      .graph
      .filter_map(|_, name| keep.contains(name).then(|| name.clone()), |_, edge| Some(*edge));
    let nodes = graph.node_indices().map(|i| (graph[i].clone(), i)).collect();
    Self { graph, nodes }
  }

  /// Restrict to a selection of services, optionally pulling in everything
  /// they transitively depend on. `None` selects the whole graph.
  ///
  /// # Errors
  ///
  /// `UnknownService` if a selected name is not in the graph.
  pub fn select(&self, selected: Option<&BTreeSet<String>>, with_dependencies: bool) -> Result<Self, ConfigError> {
    let Some(selected) = selected else {
      return Ok(self.clone());
    };

    let mut keep = BTreeSet::new();
    for name in selected {
      if !self.contains(name) {
        return Err(ConfigError::UnknownService(name.clone()));
      }
      keep.insert(name.clone());
      if with_dependencies {
        keep.extend(self.transitive_dependencies_of(name));
      }
    }

    Ok(self.restrict(&keep))
  }
}
