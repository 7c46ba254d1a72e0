// Call graph structures for callscope.
// Represents function/method call relationships between qualified identifiers.

use serde::{Deserialize, Serialize};

/// A declared function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub id: String, // module.function or module.Class.method
    pub name: String,
    pub module: String,
    pub complexity: u32,
    pub line_number: usize,
    pub parameters: Vec<String>,
}

/// A deduplicated caller -> callee relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
    pub call_count: usize,
    /// Ascending; one entry per call-site.
    pub line_numbers: Vec<usize>,
}

/// The call graph itself. Nodes are unique by id and sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallGraph {
    pub nodes: Vec<FunctionNode>,
    pub edges: Vec<CallEdge>,
}

impl CallGraph {
    pub fn new(nodes: Vec<FunctionNode>, edges: Vec<CallEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&FunctionNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, caller: &str, callee: &str) -> Option<&CallEdge> {
        self.edges
            .iter()
            .find(|e| e.caller == caller && e.callee == callee)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
