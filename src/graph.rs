//! Dependency graph module.
//!
//! Provides the `CompoundGraph` type, which records which stats every
//! compound stat reads as a directed acyclic graph (DAG). Stats tables
//! rebuild it whenever their tree changes shape, rejecting trees where a
//! compound reads a missing stat or where compounds read each other in a
//! loop.

use crate::error::StatError;
use crate::path::StatPath;
use crate::stat::StatKind;
use crate::tree::NestedStats;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// A directed acyclic graph of compound stat dependencies.
///
/// Nodes are stat paths. An edge runs from a dependency to the compound
/// that reads it, so a topological order lists every stat before the
/// compounds derived from it. Stats reached through a wildcard template are
/// recorded under their template path (`skills.*.rank`).
///
/// # Examples
///
/// ```rust
/// use statstack::graph::CompoundGraph;
/// use statstack::StatPath;
///
/// let mut graph = CompoundGraph::new();
/// let power = StatPath::new("power");
/// let str_path = StatPath::new("str");
///
/// // power reads str
/// graph.add_dependency(power.clone(), str_path.clone());
///
/// let order = graph.topological_sort().unwrap();
/// assert_eq!(order, vec![str_path, power]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompoundGraph {
    graph: DiGraph<StatPath, ()>,
    node_map: HashMap<StatPath, NodeIndex>,
}

impl CompoundGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every compound stat in `root`, wildcard
    /// templates included.
    ///
    /// Fails when a compound names no stats, reads something that is not a
    /// stat, or when compounds form a cycle.
    pub fn build(root: &NestedStats) -> Result<Self, StatError> {
        let mut compounds: Vec<(StatPath, Vec<String>)> = Vec::new();
        root.for_each_stat(true, &mut |stat| {
            if let StatKind::Compound(compound) = stat.kind() {
                compounds.push((stat.path().clone(), compound.dependencies().to_vec()));
            }
        });

        let mut graph = Self::new();
        for (path, dependencies) in compounds {
            if dependencies.is_empty() {
                return Err(StatError::InvalidCompound(path, "reads no stats".to_string()));
            }
            graph.add_node(path.clone());
            let parent = path.parent().unwrap_or_else(StatPath::root);
            for name in &dependencies {
                let target = parent.join(name);
                let located = root
                    .locate(&target)
                    .ok_or_else(|| StatError::MissingDependency(target.clone()))?;
                if located.node.as_stat().is_none() {
                    return Err(StatError::InvalidCompound(
                        path.clone(),
                        format!("{} is a branch, not a stat", target),
                    ));
                }
                graph.add_dependency(path.clone(), located.canonical);
            }
        }
        graph.detect_cycles()?;
        Ok(graph)
    }

    /// Add a node to the graph if it doesn't exist.
    pub fn add_node(&mut self, path: StatPath) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&path) {
            idx
        } else {
            let idx = self.graph.add_node(path.clone());
            self.node_map.insert(path, idx);
            idx
        }
    }

    /// Record that `dependent` reads `dependency`.
    pub fn add_dependency(&mut self, dependent: StatPath, dependency: StatPath) {
        let from_idx = self.add_node(dependency);
        let to_idx = self.add_node(dependent);
        self.graph.update_edge(from_idx, to_idx, ());
    }

    /// Detect cycles using depth-first search.
    ///
    /// The error carries the closed loop, e.g. `[a, b, a]`.
    pub fn detect_cycles(&self) -> Result<(), StatError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut cycle_path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<StatPath>,
    ) -> Option<StatError> {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(self.graph[node].clone());

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if !visited.contains(&neighbor) {
                if let Some(cycle) =
                    self.dfs_cycle_detect(neighbor, visited, rec_stack, cycle_path)
                {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let neighbor_path = self.graph[neighbor].clone();
                let start = cycle_path
                    .iter()
                    .position(|p| p == &neighbor_path)
                    .unwrap_or(0);
                let mut cycle: Vec<StatPath> = cycle_path[start..].to_vec();
                cycle.push(neighbor_path);
                return Some(StatError::Cycle { path: cycle });
            }
        }

        rec_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Stats in dependency order: every stat before the compounds reading it.
    pub fn topological_sort(&self) -> Result<Vec<StatPath>, StatError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(StatError::Cycle {
                path: vec![self.graph[cycle.node_id()].clone()],
            }),
        }
    }

    pub fn contains_node(&self, path: &StatPath) -> bool {
        self.node_map.contains_key(path)
    }

    /// Stats that `path` reads directly.
    pub fn dependencies_of(&self, path: &StatPath) -> Vec<StatPath> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Compounds that read `path` directly.
    pub fn dependents_of(&self, path: &StatPath) -> Vec<StatPath> {
        self.neighbors(path, Direction::Outgoing)
    }

    fn neighbors(&self, path: &StatPath, direction: Direction) -> Vec<StatPath> {
        let Some(&idx) = self.node_map.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<StatPath> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }
}
