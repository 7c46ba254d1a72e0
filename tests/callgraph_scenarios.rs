//! End-to-end call graph scenarios over real Python files on disk.

use std::fs;
use std::path::Path;

use callscope::application::{AnalysisMode, ProjectAnalyzer};
use callscope::config::AnalyzerConfig;
use callscope::domain::ast::{FunctionInfo, ModuleInfo};
use callscope::domain::hierarchy::CallHierarchyAnalyzer;
use callscope::error::ParseError;
use callscope::ports::SourceParser;
use tempfile::tempdir;

fn write(root: &Path, relative: &str, source: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn sequential_config() -> AnalyzerConfig {
    AnalyzerConfig {
        parallel: false,
        ..AnalyzerConfig::default()
    }
}

fn analyze(root: &Path, config: AnalyzerConfig) -> callscope::application::AnalysisResult {
    let outcome = ProjectAnalyzer::new(config).unwrap().analyze(root).unwrap();
    assert_eq!(outcome.mode, AnalysisMode::Full);
    outcome.result
}

#[test]
fn test_cross_module_call_through_from_import() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "a.py",
        "\
def main():
    helper()

def helper():
    return utility()

def utility():
    return 1
",
    );
    write(
        dir.path(),
        "b.py",
        "from a import helper\n\ndef process():\n    return helper()\n",
    );

    let result = analyze(dir.path(), sequential_config());
    let graph = &result.graph;

    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a.helper", "a.main", "a.utility", "b.process"]);
    assert!(graph.edge("a.main", "a.helper").is_some());
    assert!(graph.edge("a.helper", "a.utility").is_some());
    assert_eq!(graph.edges.len(), 3);
    let edge = graph.edge("b.process", "a.helper").expect("missing edge");
    assert_eq!(edge.call_count, 1);
    assert_eq!(edge.line_numbers, vec![4]);

    let analyzer = CallHierarchyAnalyzer::new(result.graph);
    let callers = analyzer.get_callers("a.utility");
    assert_eq!(callers.len(), 3);
    assert_eq!(callers.get("a.helper"), Some(&1));
    assert_eq!(callers.get("a.main"), Some(&2));
    assert_eq!(callers.get("b.process"), Some(&2));
    assert!(analyzer.get_callees("a.utility").is_empty());
}

#[test]
fn test_repeated_calls_collapse_into_one_edge() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "m.py",
        "def g():\n    pass\n\ndef f():\n    g()\n    g()\n",
    );

    let result = analyze(dir.path(), sequential_config());
    assert_eq!(result.graph.edges.len(), 1);
    let edge = result.graph.edge("m.f", "m.g").unwrap();
    assert_eq!(edge.call_count, 2);
    assert_eq!(edge.line_numbers, vec![5, 6]);
}

#[test]
fn test_package_modules_and_methods() {
    let dir = tempdir().unwrap();
    write(dir.path(), "pkg/__init__.py", "");
    write(
        dir.path(),
        "pkg/store.py",
        "\
class Store:
    def save(self, item):
        self.validate(item)

    def validate(self, item):
        pass
",
    );
    write(
        dir.path(),
        "pkg/api.py",
        "\
from .store import Store

def handler(item):
    Store.save(None, item)
",
    );

    let result = analyze(dir.path(), sequential_config());
    let graph = &result.graph;
    assert!(graph.edge("pkg.store.Store.save", "pkg.store.Store.validate").is_some());
    assert!(graph.edge("pkg.api.handler", "pkg.store.Store.save").is_some());

    let analyzer = CallHierarchyAnalyzer::new(result.graph);
    let callers = analyzer.get_callers("pkg.store.Store.validate");
    assert_eq!(callers.get("pkg.store.Store.save"), Some(&1));
    assert_eq!(callers.get("pkg.api.handler"), Some(&2));

    let module = analyzer.filter_by_module("pkg.store");
    assert_eq!(module.nodes.len(), 2);
    assert_eq!(module.edges.len(), 1);
}

#[test]
fn test_relative_imports_inside_package_init() {
    let dir = tempdir().unwrap();
    write(dir.path(), "pkg/helpers.py", "def assist():\n    pass\n");
    write(
        dir.path(),
        "pkg/__init__.py",
        "from .helpers import assist\n\ndef boot():\n    assist()\n",
    );

    let result = analyze(dir.path(), sequential_config());
    let ids: Vec<&str> = result.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["pkg.boot", "pkg.helpers.assist"]);
    let edge = result.graph.edge("pkg.boot", "pkg.helpers.assist").expect("missing edge");
    assert_eq!(edge.line_numbers, vec![4]);
}

#[test]
fn test_recursive_cycle_terminates() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "loop.py",
        "def ping(n):\n    pong(n)\n\ndef pong(n):\n    ping(n)\n",
    );

    let result = analyze(dir.path(), sequential_config());
    let analyzer = CallHierarchyAnalyzer::new(result.graph);
    let callers = analyzer.get_callers("loop.ping");
    assert_eq!(callers.len(), 1);
    assert_eq!(callers.get("loop.pong"), Some(&1));
    assert!(analyzer.entry_points().is_empty());
}

#[test]
fn test_search_is_case_insensitive() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.py", "def helper():\n    pass\n\ndef other():\n    pass\n");

    let result = analyze(dir.path(), sequential_config());
    let analyzer = CallHierarchyAnalyzer::new(result.graph);
    let hits: Vec<&str> = analyzer.search("HELP").iter().map(|n| n.id.as_str()).collect();
    assert_eq!(hits, vec!["a.helper"]);
}

#[test]
fn test_broken_module_does_not_abort_analysis() {
    let dir = tempdir().unwrap();
    write(dir.path(), "good.py", "def ok():\n    pass\n");
    write(dir.path(), "bad.py", "def broken(:\n    pass\n");

    let result = analyze(dir.path(), sequential_config());
    assert!(result.graph.node("good.ok").is_some());
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].module, "bad");
}

#[test]
fn test_excluded_directories_are_skipped() {
    let dir = tempdir().unwrap();
    write(dir.path(), "app.py", "def main():\n    pass\n");
    write(dir.path(), "venv/lib/dep.py", "def vendored():\n    pass\n");
    write(dir.path(), ".hidden/tool.py", "def hidden():\n    pass\n");

    let result = analyze(dir.path(), sequential_config());
    let ids: Vec<&str> = result.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["app.main"]);
}

#[test]
fn test_parallel_build_matches_sequential() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        let next = (i + 1) % 12;
        write(
            dir.path(),
            &format!("m{:02}.py", i),
            &format!(
                "from m{next:02} import f{next}\n\ndef f{i}():\n    f{next}()\n    local{i}()\n\ndef local{i}():\n    pass\n"
            ),
        );
    }

    let sequential = analyze(dir.path(), sequential_config());
    let parallel = analyze(
        dir.path(),
        AnalyzerConfig {
            parallel: true,
            parallel_threshold: 2,
            worker_threads: Some(3),
            ..AnalyzerConfig::default()
        },
    );

    assert_eq!(sequential.graph, parallel.graph);
    assert_eq!(sequential.graph.edges.len(), 24);
}

#[test]
fn test_missing_project_is_an_error() {
    let dir = tempdir().unwrap();
    let analyzer = ProjectAnalyzer::new(sequential_config()).unwrap();
    assert!(analyzer.analyze(&dir.path().join("nope")).is_err());
}

/// Declares one function per module without looking at the file.
struct StubParser;

impl SourceParser for StubParser {
    fn parse_module(&self, module_name: &str, path: &Path) -> Result<ModuleInfo, ParseError> {
        let mut module = ModuleInfo::new(module_name, path);
        module.functions.push(FunctionInfo::new("run", 1));
        Ok(module)
    }
}

#[test]
fn test_custom_source_parser() {
    let dir = tempdir().unwrap();
    write(dir.path(), "job.py", "def run():\n    step()\n\ndef step():\n    pass\n");

    let outcome = ProjectAnalyzer::new(sequential_config())
        .unwrap()
        .with_parser(Box::new(StubParser))
        .analyze(dir.path())
        .unwrap();

    // Only what the parser declares is registered, so the call to step() is dropped.
    let ids: Vec<&str> = outcome.result.graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["job.run"]);
    assert!(outcome.result.graph.edges.is_empty());
}
