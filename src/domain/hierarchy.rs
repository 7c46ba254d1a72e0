//! Call hierarchy queries over a finished [`CallGraph`].
//!
//! Adjacency is computed once at construction; every query is a pure read, so
//! an analyzer can be shared across threads without locking.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::domain::callgraph::{CallGraph, FunctionNode};

/// Callers and callees of one function, each mapped to its shortest hop depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallHierarchy {
    /// `None` when the id is not in the graph.
    pub function: Option<FunctionNode>,
    pub callers: BTreeMap<String, usize>,
    pub callees: BTreeMap<String, usize>,
    pub total_callers: usize,
    pub total_callees: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
}

pub struct CallHierarchyAnalyzer {
    graph: CallGraph,
    callers_of: HashMap<String, HashSet<String>>,
    callees_of: HashMap<String, HashSet<String>>,
}

impl CallHierarchyAnalyzer {
    pub fn new(graph: CallGraph) -> Self {
        let mut callers_of: HashMap<String, HashSet<String>> = HashMap::new();
        let mut callees_of: HashMap<String, HashSet<String>> = HashMap::new();

        for edge in &graph.edges {
            callees_of
                .entry(edge.caller.clone())
                .or_default()
                .insert(edge.callee.clone());
            callers_of
                .entry(edge.callee.clone())
                .or_default()
                .insert(edge.caller.clone());
        }

        Self {
            graph,
            callers_of,
            callees_of,
        }
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn node(&self, id: &str) -> Option<&FunctionNode> {
        self.graph.node(id)
    }

    /// Every transitive caller of `id` with its hop depth.
    pub fn get_callers(&self, id: &str) -> BTreeMap<String, usize> {
        bfs(&self.callers_of, id, None)
    }

    /// Every transitive callee of `id` with its hop depth.
    pub fn get_callees(&self, id: &str) -> BTreeMap<String, usize> {
        bfs(&self.callees_of, id, None)
    }

    pub fn callers_within(&self, id: &str, max_depth: usize) -> BTreeMap<String, usize> {
        bfs(&self.callers_of, id, Some(max_depth))
    }

    pub fn callees_within(&self, id: &str, max_depth: usize) -> BTreeMap<String, usize> {
        bfs(&self.callees_of, id, Some(max_depth))
    }

    pub fn get_call_hierarchy(&self, id: &str) -> CallHierarchy {
        let callers = self.get_callers(id);
        let callees = self.get_callees(id);
        CallHierarchy {
            function: self.node(id).cloned(),
            total_callers: callers.len(),
            total_callees: callees.len(),
            callers,
            callees,
        }
    }

    /// Subgraph restricted to one module; cross-module edges are dropped.
    pub fn filter_by_module(&self, module: &str) -> CallGraph {
        let nodes: Vec<FunctionNode> = self
            .graph
            .nodes
            .iter()
            .filter(|n| n.module == module)
            .cloned()
            .collect();
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = self
            .graph
            .edges
            .iter()
            .filter(|e| ids.contains(e.caller.as_str()) && ids.contains(e.callee.as_str()))
            .cloned()
            .collect();
        CallGraph::new(nodes, edges)
    }

    /// Case-insensitive substring match on node name or module.
    pub fn search(&self, query: &str) -> Vec<&FunctionNode> {
        let needle = query.to_lowercase();
        self.graph
            .nodes
            .iter()
            .filter(|n| {
                n.name.to_lowercase().contains(&needle) || n.module.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Functions nothing in the graph calls, sorted by id.
    pub fn entry_points(&self) -> Vec<&FunctionNode> {
        let mut roots: Vec<&FunctionNode> = self
            .graph
            .nodes
            .iter()
            .filter(|n| !self.callers_of.contains_key(&n.id))
            .collect();
        roots.sort_by(|a, b| a.id.cmp(&b.id));
        roots
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.graph.nodes.len(),
            edges: self.graph.edges.len(),
        }
    }
}

/// Breadth-first walk from `start`'s direct neighbours (depth 1). First visit
/// wins, which gives shortest depths and terminates on cycles. `start` itself
/// is never reported.
fn bfs(
    adjacency: &HashMap<String, HashSet<String>>,
    start: &str,
    max_depth: Option<usize>,
) -> BTreeMap<String, usize> {
    let mut depths = BTreeMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

    visited.insert(start);
    queue.push_back((start, 0));

    while let Some((current, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }
        let Some(neighbours) = adjacency.get(current) else {
            continue;
        };
        for next in neighbours {
            if visited.insert(next.as_str()) {
                depths.insert(next.clone(), depth + 1);
                queue.push_back((next.as_str(), depth + 1));
            }
        }
    }

    depths
}
