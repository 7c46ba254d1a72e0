//! Change detection between analysis runs and the incremental-vs-full decision.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::infrastructure::snapshot::ProjectSnapshot;

pub struct IncrementalAnalyzer {
    config: AnalyzerConfig,
}

impl IncrementalAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Relative paths added, removed or modified since `previous`.
    pub fn changed_files(&self, project_dir: &Path, previous: &ProjectSnapshot) -> BTreeSet<String> {
        let current = ProjectSnapshot::capture(project_dir, &self.config);
        previous.diff(&current)
    }

    /// Incremental only pays off for a small, non-empty change set.
    pub fn should_use_incremental(&self, changed: &BTreeSet<String>, total_file_count: usize) -> bool {
        if changed.is_empty() || total_file_count == 0 {
            return false;
        }
        let ratio = changed.len() as f64 / total_file_count as f64;
        let incremental = ratio <= self.config.incremental_ratio;
        debug!(
            target: "callscope::incremental",
            changed = changed.len(),
            total = total_file_count,
            ratio,
            incremental,
            "incremental decision"
        );
        incremental
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn changed(n: usize) -> BTreeSet<String> {
        (0..n).map(|i| format!("f{}.py", i)).collect()
    }

    #[test]
    fn test_decision_thresholds() {
        let analyzer = IncrementalAnalyzer::new(&AnalyzerConfig::default());
        assert!(analyzer.should_use_incremental(&changed(2), 20));
        assert!(analyzer.should_use_incremental(&changed(4), 20));
        assert!(!analyzer.should_use_incremental(&changed(5), 20));
        assert!(!analyzer.should_use_incremental(&changed(0), 20));
        assert!(!analyzer.should_use_incremental(&changed(1), 0));
    }

    #[test]
    fn test_changed_files_against_previous() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.py"), "a = 1\n").unwrap();
        fs::write(dir.path().join("edit.py"), "b = 1\n").unwrap();
        fs::write(dir.path().join("gone.py"), "c = 1\n").unwrap();

        let config = AnalyzerConfig::default();
        let analyzer = IncrementalAnalyzer::new(&config);
        let previous = ProjectSnapshot::capture(dir.path(), &config);

        fs::write(dir.path().join("edit.py"), "b = 2\n").unwrap();
        fs::remove_file(dir.path().join("gone.py")).unwrap();
        fs::write(dir.path().join("new.py"), "d = 1\n").unwrap();

        let changed: Vec<String> = analyzer
            .changed_files(dir.path(), &previous)
            .into_iter()
            .collect();
        assert_eq!(changed, vec!["edit.py", "gone.py", "new.py"]);
    }
}
