//! Analysis pipeline: cache lookup, incremental or full rebuild, cache write.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::domain::ast::ModuleInfo;
use crate::domain::builder::{BuildReport, CallGraphBuilder, ModuleFailure};
use crate::domain::callgraph::CallGraph;
use crate::infrastructure::cache::{CacheLookup, CacheManager};
use crate::infrastructure::concurrency::build_worker_pool;
use crate::infrastructure::incremental::IncrementalAnalyzer;
use crate::infrastructure::project_loader::{ProjectLoader, SourceFile};
use crate::infrastructure::python_parser::PythonModuleParser;
use crate::infrastructure::snapshot::normalize_path;
use crate::ports::SourceParser;

const CACHE_OPEN_ATTEMPTS: u32 = 3;
const CACHE_OPEN_BACKOFF: Duration = Duration::from_millis(50);

/// Everything one analysis run produces; this is the cached payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub modules: Vec<ModuleInfo>,
    pub graph: CallGraph,
    /// Modules that could not be parsed or walked.
    pub failures: Vec<ModuleFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisMode {
    Cached,
    Incremental { changed: BTreeSet<String> },
    Full,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub mode: AnalysisMode,
}

pub struct ProjectAnalyzer {
    config: AnalyzerConfig,
    parser: Box<dyn SourceParser>,
    builder: CallGraphBuilder,
    incremental: IncrementalAnalyzer,
    cache: Option<CacheManager>,
}

impl ProjectAnalyzer {
    /// Analyzer with the bundled Python parser and no cache.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let builder = if config.parallel {
            let pool = build_worker_pool(config.worker_threads)
                .context("Failed to build extraction worker pool")?;
            CallGraphBuilder::parallel(Arc::new(pool), config.parallel_threshold)
        } else {
            CallGraphBuilder::sequential()
        };

        Ok(Self {
            incremental: IncrementalAnalyzer::new(&config),
            parser: Box::new(PythonModuleParser),
            builder,
            cache: None,
            config,
        })
    }

    /// Open the result cache in `config.cache_dir`. The store is locked by
    /// whichever process opened it first; if it stays unavailable after a few
    /// attempts the analyzer runs uncached and every run is a full analysis.
    pub fn with_cache(mut self) -> Self {
        let mut attempt = 1;
        loop {
            match CacheManager::open(&self.config.cache_dir, &self.config) {
                Ok(cache) => {
                    self.cache = Some(cache);
                    return self;
                }
                Err(e) if attempt < CACHE_OPEN_ATTEMPTS => {
                    debug!(
                        target: "callscope::pipeline",
                        attempt,
                        error = %e,
                        "cache busy, retrying"
                    );
                    thread::sleep(CACHE_OPEN_BACKOFF * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        target: "callscope::pipeline",
                        cache_dir = %self.config.cache_dir.display(),
                        error = %e,
                        "cache unavailable, analyzing without it"
                    );
                    return self;
                }
            }
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn cache(&self) -> Option<&CacheManager> {
        self.cache.as_ref()
    }

    pub fn analyze(&self, project_dir: &Path) -> Result<AnalysisOutcome> {
        anyhow::ensure!(
            project_dir.is_dir(),
            "Project directory not found: {}",
            project_dir.display()
        );
        let root = normalize_path(project_dir);

        let Some(cache) = &self.cache else {
            let result = self.full_analysis(&root);
            return Ok(AnalysisOutcome {
                result,
                mode: AnalysisMode::Full,
            });
        };

        let lookup = cache.lookup(&root);
        debug!(target: "callscope::pipeline", outcome = lookup.reason(), "cache lookup");

        let (result, mode, snapshot) = match lookup {
            CacheLookup::Hit(entry) => match serde_json::from_slice::<AnalysisResult>(&entry.payload) {
                Ok(result) => {
                    return Ok(AnalysisOutcome {
                        result,
                        mode: AnalysisMode::Cached,
                    })
                }
                Err(e) => {
                    warn!(target: "callscope::pipeline", error = %e, "cached payload unreadable, rebuilding");
                    let snapshot = cache.snapshot(&root);
                    (self.full_analysis(&root), AnalysisMode::Full, snapshot)
                }
            },
            CacheLookup::Stale { previous, current } => {
                let changed = previous.file_hashes.diff(&current);
                let prior = serde_json::from_slice::<AnalysisResult>(&previous.payload).ok();
                match prior {
                    Some(prior) if self.incremental.should_use_incremental(&changed, current.len()) => {
                        let result = self.incremental_analysis(&root, prior, &changed);
                        (result, AnalysisMode::Incremental { changed }, current)
                    }
                    _ => (self.full_analysis(&root), AnalysisMode::Full, current),
                }
            }
            CacheLookup::Missing | CacheLookup::Corrupt(_) => {
                let snapshot = cache.snapshot(&root);
                (self.full_analysis(&root), AnalysisMode::Full, snapshot)
            }
        };

        let payload = serde_json::to_vec(&result).context("Failed to serialize analysis result")?;
        if let Err(e) = cache.store(&root, payload, snapshot) {
            warn!(target: "callscope::pipeline", error = %e, "failed to cache analysis result");
        }

        Ok(AnalysisOutcome { result, mode })
    }

    fn full_analysis(&self, root: &Path) -> AnalysisResult {
        let sources = ProjectLoader::discover_sources(root, &self.config);
        info!(target: "callscope::pipeline", files = sources.len(), "full analysis");
        let (modules, failures) = self.parse_sources(&sources);
        self.build(modules, failures)
    }

    /// Reuse module descriptions of unchanged files; re-parse the rest.
    fn incremental_analysis(
        &self,
        root: &Path,
        prior: AnalysisResult,
        changed: &BTreeSet<String>,
    ) -> AnalysisResult {
        let sources = ProjectLoader::discover_sources(root, &self.config);
        let mut reusable: HashMap<PathBuf, ModuleInfo> = prior
            .modules
            .into_iter()
            .map(|m| (m.path.clone(), m))
            .collect();

        let mut modules = Vec::with_capacity(sources.len());
        let mut to_parse = Vec::new();
        for source in sources {
            match reusable.remove(&source.path) {
                Some(module) if !changed.contains(&source.relative) => modules.push(module),
                _ => to_parse.push(source),
            }
        }
        info!(
            target: "callscope::pipeline",
            reused = modules.len(),
            reparsed = to_parse.len(),
            "incremental analysis"
        );

        let (parsed, failures) = self.parse_sources(&to_parse);
        modules.extend(parsed);
        modules.sort_by(|a, b| a.path.cmp(&b.path));
        self.build(modules, failures)
    }

    fn parse_sources(&self, sources: &[SourceFile]) -> (Vec<ModuleInfo>, Vec<ModuleFailure>) {
        let mut modules = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();
        for source in sources {
            match self.parser.parse_module(&source.module_name, &source.path) {
                Ok(module) => modules.push(module),
                Err(e) => {
                    warn!(
                        target: "callscope::pipeline",
                        file = %source.relative,
                        error = %e,
                        "module could not be parsed"
                    );
                    failures.push(ModuleFailure {
                        module: source.module_name.clone(),
                        path: source.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (modules, failures)
    }

    fn build(&self, modules: Vec<ModuleInfo>, mut failures: Vec<ModuleFailure>) -> AnalysisResult {
        let BuildReport {
            graph,
            failures: build_failures,
        } = self.builder.build(&modules);
        failures.extend(build_failures);
        AnalysisResult {
            modules,
            graph,
            failures,
        }
    }
}
