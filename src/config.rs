//! Analyzer configuration, loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Name of the config file looked up in a project root.
pub const CONFIG_FILE_NAME: &str = "callscope.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Directory holding the persistent result cache.
    pub cache_dir: PathBuf,
    /// Byte budget for all cache entries, in megabytes.
    pub max_cache_size_mb: u64,
    pub parallel: bool,
    /// Projects with fewer modules are extracted sequentially.
    pub parallel_threshold: usize,
    /// Worker count; all cores when unset.
    pub worker_threads: Option<usize>,
    /// Largest changed/total ratio for which an incremental update is used.
    pub incremental_ratio: f64,
    /// Files larger than this are not tracked or analyzed.
    pub max_file_size_bytes: u64,
    pub excluded_dirs: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".callscope-cache"),
            max_cache_size_mb: 100,
            parallel: true,
            parallel_threshold: 8,
            worker_threads: None,
            incremental_ratio: 0.2,
            max_file_size_bytes: 1024 * 1024,
            excluded_dirs: [
                ".git",
                "__pycache__",
                "venv",
                ".venv",
                "env",
                "node_modules",
                "build",
                "dist",
                "site-packages",
                ".tox",
                ".mypy_cache",
                ".pytest_cache",
                ".callscope-cache",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load `callscope.toml` from `project_dir` if present, defaults otherwise.
    pub fn for_project(project_dir: &Path) -> Result<Self> {
        let candidate = project_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// An explicit config file wins; otherwise the project's own file is used.
    pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Self::for_project(project_dir),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AnalyzerConfig = toml::from_str(text)?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&config.incremental_ratio),
            "incremental_ratio must be within 0.0..=1.0, got {}",
            config.incremental_ratio
        );
        Ok(config)
    }

    pub fn max_cache_size_bytes(&self) -> u64 {
        self.max_cache_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.max_cache_size_bytes(), 100 * 1024 * 1024);
        assert!(config.is_excluded_dir("__pycache__"));
        assert!(!config.is_excluded_dir("src"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalyzerConfig::from_toml("max_cache_size_mb = 5\nparallel = false\n").unwrap();
        assert_eq!(config.max_cache_size_mb, 5);
        assert!(!config.parallel);
        assert_eq!(config.incremental_ratio, 0.2);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(AnalyzerConfig::from_toml("max_cache_mb = 5\n").is_err());
    }

    #[test]
    fn test_ratio_validated() {
        assert!(AnalyzerConfig::from_toml("incremental_ratio = 1.5\n").is_err());
    }

    #[test]
    fn test_resolve_prefers_explicit_then_project_file() {
        let project = tempfile::tempdir().unwrap();
        fs::write(
            project.path().join(CONFIG_FILE_NAME),
            "cache_dir = \"/tmp/project-cache\"\n",
        )
        .unwrap();

        let config = AnalyzerConfig::resolve(project.path(), None).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/project-cache"));

        let other = tempfile::tempdir().unwrap();
        let explicit = other.path().join("custom.toml");
        fs::write(&explicit, "cache_dir = \"/tmp/explicit-cache\"\n").unwrap();
        let config = AnalyzerConfig::resolve(project.path(), Some(&explicit)).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/explicit-cache"));

        let bare = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig::resolve(bare.path(), None).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }
}
