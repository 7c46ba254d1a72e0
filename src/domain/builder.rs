//! Call graph construction.
//!
//! Registry first, then per-module extraction (optionally on a worker pool),
//! then a single-threaded reduction of raw call-sites into deduplicated edges.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::ast::ModuleInfo;
use crate::domain::callgraph::{CallEdge, CallGraph};
use crate::domain::extractor::{extract_calls, python_parser, RawCall};
use crate::domain::index::FunctionRegistry;
use crate::error::ExtractError;

/// A module that contributed no edges to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleFailure {
    pub module: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one build: the graph plus every module that could not be walked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub graph: CallGraph,
    pub failures: Vec<ModuleFailure>,
}

type ModuleOutcome = Result<Vec<RawCall>, ModuleFailure>;

/// Builds a [`CallGraph`] from module descriptions.
pub struct CallGraphBuilder {
    pool: Option<Arc<ThreadPool>>,
    parallel_threshold: usize,
}

impl Default for CallGraphBuilder {
    fn default() -> Self {
        Self::sequential()
    }
}

impl CallGraphBuilder {
    /// Extract every module on the calling thread.
    pub fn sequential() -> Self {
        Self {
            pool: None,
            parallel_threshold: usize::MAX,
        }
    }

    /// Extract on `pool` once a project has at least `parallel_threshold` modules.
    pub fn parallel(pool: Arc<ThreadPool>, parallel_threshold: usize) -> Self {
        Self {
            pool: Some(pool),
            parallel_threshold,
        }
    }

    pub fn register(&self, modules: &[ModuleInfo]) -> FunctionRegistry {
        FunctionRegistry::register(modules)
    }

    pub fn build(&self, modules: &[ModuleInfo]) -> BuildReport {
        let registry = self.register(modules);
        debug!(
            target: "callscope::builder",
            functions = registry.len(),
            modules = modules.len(),
            "registry built"
        );

        let outcomes = match &self.pool {
            Some(pool) if modules.len() >= self.parallel_threshold => {
                let workers = pool.current_num_threads().max(1);
                let chunk_size = modules.len().div_ceil(workers).max(1);
                let chunks: Vec<Vec<ModuleOutcome>> = pool.install(|| {
                    modules
                        .par_chunks(chunk_size)
                        .map(|chunk| extract_chunk(chunk, &registry))
                        .collect()
                });
                chunks.into_iter().flatten().collect()
            }
            _ => extract_chunk(modules, &registry),
        };

        // Join point: every worker's output is in `outcomes` before reduction.
        let mut calls = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(module_calls) => calls.extend(module_calls),
                Err(failure) => {
                    warn!(
                        target: "callscope::builder",
                        module = %failure.module,
                        reason = %failure.reason,
                        "module skipped during call extraction"
                    );
                    failures.push(failure);
                }
            }
        }

        let edges = aggregate_edges(calls);
        let graph = CallGraph::new(registry.nodes(), edges);
        info!(
            target: "callscope::builder",
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            failures = failures.len(),
            "call graph built"
        );

        BuildReport { graph, failures }
    }
}

/// Fold raw call-sites into one edge per (caller, callee), lines ascending.
pub fn aggregate_edges(calls: impl IntoIterator<Item = RawCall>) -> Vec<CallEdge> {
    let mut grouped: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for call in calls {
        grouped
            .entry((call.caller, call.callee))
            .or_default()
            .push(call.line);
    }

    grouped
        .into_iter()
        .map(|((caller, callee), mut line_numbers)| {
            line_numbers.sort_unstable();
            CallEdge {
                caller,
                callee,
                call_count: line_numbers.len(),
                line_numbers,
            }
        })
        .collect()
}

/// Each chunk owns its own parser; the registry is only read.
fn extract_chunk(modules: &[ModuleInfo], registry: &FunctionRegistry) -> Vec<ModuleOutcome> {
    let mut parser = match python_parser() {
        Ok(parser) => parser,
        Err(e) => {
            let reason = e.to_string();
            return modules
                .iter()
                .map(|m| Err(failure(m, reason.clone())))
                .collect();
        }
    };

    modules
        .iter()
        .map(|module| {
            let source = fs::read_to_string(&module.path).map_err(|source| ExtractError::Read {
                path: module.path.clone(),
                source,
            });
            source
                .and_then(|source| {
                    extract_calls(&mut parser, &module.name, module.is_package(), &source, registry)
                })
                .map_err(|e| failure(module, e.to_string()))
        })
        .collect()
}

fn failure(module: &ModuleInfo, reason: String) -> ModuleFailure {
    ModuleFailure {
        module: module.name.clone(),
        path: module.path.clone(),
        reason,
    }
}
