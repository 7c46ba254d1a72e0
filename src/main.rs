// Command-line entry point for callscope.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use callscope::application::{AnalysisOutcome, ProjectAnalyzer};
use callscope::config::AnalyzerConfig;
use callscope::domain::hierarchy::CallHierarchyAnalyzer;
use callscope::infrastructure::cache::CacheManager;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "callscope=info";

#[derive(Parser, Debug)]
#[command(author, version, about = "Call graph analysis for Python projects", long_about = None)]
struct Cli {
    /// Config file; defaults to callscope.toml in the project root
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ProjectArgs {
    /// Project root directory
    project: PathBuf,

    /// Analyze from scratch without reading or writing the cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a project and print its call graph
    Analyze {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Transitive callers of a function
    Callers {
        #[command(flatten)]
        project: ProjectArgs,
        /// Qualified function id, e.g. pkg.module.Class.method
        function: String,
        /// Stop after this many hops
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Transitive callees of a function
    Callees {
        #[command(flatten)]
        project: ProjectArgs,
        function: String,
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Callers and callees of a function together
    Hierarchy {
        #[command(flatten)]
        project: ProjectArgs,
        function: String,
    },
    /// Case-insensitive search over function and module names
    Search {
        #[command(flatten)]
        project: ProjectArgs,
        query: String,
    },
    /// Subgraph of a single module
    Module {
        #[command(flatten)]
        project: ProjectArgs,
        module: String,
    },
    /// Functions that nothing else calls
    EntryPoints {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Inspect or reset the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    Stats,
    Clear,
    /// Drop the cached result for one project
    Invalidate { project: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze { project } => {
            let outcome = analyze(&project, cli.config.as_deref())?;
            print_json(&json!({
                "mode": outcome.mode,
                "graph": outcome.result.graph,
                "failures": outcome.result.failures,
            }))
        }
        Command::Callers {
            project,
            function,
            depth,
        } => {
            let analyzer = hierarchy(&project, cli.config.as_deref())?;
            let callers = match depth {
                Some(depth) => analyzer.callers_within(&function, depth),
                None => analyzer.get_callers(&function),
            };
            print_json(&json!({ "function": function, "callers": callers }))
        }
        Command::Callees {
            project,
            function,
            depth,
        } => {
            let analyzer = hierarchy(&project, cli.config.as_deref())?;
            let callees = match depth {
                Some(depth) => analyzer.callees_within(&function, depth),
                None => analyzer.get_callees(&function),
            };
            print_json(&json!({ "function": function, "callees": callees }))
        }
        Command::Hierarchy { project, function } => {
            let analyzer = hierarchy(&project, cli.config.as_deref())?;
            print_json(&analyzer.get_call_hierarchy(&function))
        }
        Command::Search { project, query } => {
            let analyzer = hierarchy(&project, cli.config.as_deref())?;
            print_json(&analyzer.search(&query))
        }
        Command::Module { project, module } => {
            let analyzer = hierarchy(&project, cli.config.as_deref())?;
            print_json(&analyzer.filter_by_module(&module))
        }
        Command::EntryPoints { project } => {
            let analyzer = hierarchy(&project, cli.config.as_deref())?;
            print_json(&analyzer.entry_points())
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => {
                let cache = open_cache(&AnalyzerConfig::load(cli.config.as_deref())?)?;
                print_json(&cache.stats()?)
            }
            CacheAction::Clear => {
                let cache = open_cache(&AnalyzerConfig::load(cli.config.as_deref())?)?;
                cache.clear()?;
                print_json(&json!({ "cleared": true }))
            }
            CacheAction::Invalidate { project } => {
                // The project's own callscope.toml may point at a different cache.
                let cache = open_cache(&AnalyzerConfig::resolve(&project, cli.config.as_deref())?)?;
                let removed = cache.invalidate(&project)?;
                print_json(&json!({ "invalidated": removed }))
            }
        },
    }
}

fn open_cache(config: &AnalyzerConfig) -> Result<CacheManager> {
    CacheManager::open(&config.cache_dir, config)
        .with_context(|| format!("Failed to open cache at {}", config.cache_dir.display()))
}

fn analyze(args: &ProjectArgs, config_path: Option<&Path>) -> Result<AnalysisOutcome> {
    let config = AnalyzerConfig::resolve(&args.project, config_path)?;
    let mut analyzer = ProjectAnalyzer::new(config)?;
    if !args.no_cache {
        analyzer = analyzer.with_cache();
    }
    analyzer
        .analyze(&args.project)
        .with_context(|| format!("Analysis of {} failed", args.project.display()))
}

fn hierarchy(args: &ProjectArgs, config_path: Option<&Path>) -> Result<CallHierarchyAnalyzer> {
    let outcome = analyze(args, config_path)?;
    Ok(CallHierarchyAnalyzer::new(outcome.result.graph))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_log_filter_is_info() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_cache_invalidate_takes_project() {
        let cli = Cli::try_parse_from(["callscope", "cache", "invalidate", "proj"]).unwrap();
        match cli.command {
            Command::Cache {
                action: CacheAction::Invalidate { project },
            } => assert_eq!(project, PathBuf::from("proj")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
