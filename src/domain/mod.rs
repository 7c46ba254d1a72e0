// Core call-graph model: module descriptions, registry, extraction and queries.

pub mod ast;
pub mod builder;
pub mod callgraph;
pub mod extractor;
pub mod hierarchy;
pub mod index;

pub use builder::{BuildReport, CallGraphBuilder, ModuleFailure};
pub use callgraph::{CallEdge, CallGraph, FunctionNode};
pub use hierarchy::{CallHierarchy, CallHierarchyAnalyzer};
pub use index::FunctionRegistry;
