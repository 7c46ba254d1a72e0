//! Content hashing and project hash snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use xxhash_rust::xxh3::xxh3_128;

use crate::config::AnalyzerConfig;
use crate::infrastructure::project_loader::ProjectLoader;

/// 32 lowercase hex characters of the xxh3-128 digest.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:032x}", xxh3_128(bytes))
}

pub fn hash_file(path: &Path) -> std::io::Result<String> {
    fs::read(path).map(|bytes| hash_bytes(&bytes))
}

/// Cache key of a project: hash of its normalized absolute path.
pub fn project_key(project_dir: &Path) -> String {
    let normalized = normalize_path(project_dir);
    hash_bytes(normalized.to_string_lossy().as_bytes())
}

pub fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

/// Relative path -> content hash for every tracked file of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    files: BTreeMap<String, String>,
}

impl ProjectSnapshot {
    /// Hash every tracked file under `project_dir`. Files that cannot be read
    /// are left out, which makes the next comparison a mismatch.
    pub fn capture(project_dir: &Path, config: &AnalyzerConfig) -> Self {
        let mut files = BTreeMap::new();
        for (relative, path) in ProjectLoader::tracked_files(project_dir, config) {
            match hash_file(&path) {
                Ok(hash) => {
                    files.insert(relative, hash);
                }
                Err(e) => {
                    warn!(
                        target: "callscope::cache",
                        file = %path.display(),
                        error = %e,
                        "file excluded from snapshot"
                    );
                }
            }
        }
        Self { files }
    }

    pub fn from_map(files: BTreeMap<String, String>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn get(&self, relative: &str) -> Option<&str> {
        self.files.get(relative).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths added, removed or modified between `self` and `other`.
    pub fn diff(&self, other: &ProjectSnapshot) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for (path, hash) in &self.files {
            if other.files.get(path) != Some(hash) {
                changed.insert(path.clone());
            }
        }
        for path in other.files.keys() {
            if !self.files.contains_key(path) {
                changed.insert(path.clone());
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot(pairs: &[(&str, &str)]) -> ProjectSnapshot {
        ProjectSnapshot::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_hash_is_fixed_length_hex() {
        let hash = hash_bytes(b"def f():\n    pass\n");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_bytes(b"def f():\n    pass\n"));
        assert_ne!(hash, hash_bytes(b"def g():\n    pass\n"));
    }

    #[test]
    fn test_project_key_stable() {
        let dir = tempdir().unwrap();
        let key = project_key(dir.path());
        assert_eq!(key.len(), 32);
        assert_eq!(key, project_key(&dir.path().join(".")));
    }

    #[test]
    fn test_diff_covers_add_remove_modify() {
        let old = snapshot(&[("a.py", "1"), ("b.py", "2"), ("c.py", "3")]);
        let new = snapshot(&[("a.py", "1"), ("b.py", "X"), ("d.py", "4")]);

        let changed: Vec<String> = old.diff(&new).into_iter().collect();
        assert_eq!(changed, vec!["b.py", "c.py", "d.py"]);
        assert!(old.diff(&old).is_empty());
    }

    #[test]
    fn test_capture_hashes_sources_and_manifests() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print(1)\n").unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();

        let snap = ProjectSnapshot::capture(dir.path(), &AnalyzerConfig::default());
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("app.py"), Some(hash_bytes(b"print(1)\n").as_str()));
        assert!(snap.get("pyproject.toml").is_some());
    }
}
