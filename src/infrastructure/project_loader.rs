use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::AnalyzerConfig;

/// Dependency manifests tracked when they sit directly under the project root.
pub const MANIFEST_FILES: &[&str] = &[
    "requirements.txt",
    "requirements-dev.txt",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "Pipfile",
    "Pipfile.lock",
    "poetry.lock",
    "package.json",
    "Cargo.toml",
    "go.mod",
];

pub const SOURCE_EXTENSION: &str = "py";

/// A source file selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Root-relative, `/`-separated.
    pub relative: String,
    pub module_name: String,
}

pub struct ProjectLoader;

impl ProjectLoader {
    /// All analyzable source files under `root`, sorted by relative path.
    pub fn discover_sources(root: &Path, config: &AnalyzerConfig) -> Vec<SourceFile> {
        let mut files: Vec<SourceFile> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !Self::skip_dir(entry, config))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
            })
            .filter(|entry| {
                entry
                    .metadata()
                    .map(|m| m.len() <= config.max_file_size_bytes)
                    .unwrap_or(false)
            })
            .filter_map(|entry| {
                let relative = relative_key(root, entry.path())?;
                let module_name = module_name_for(&relative);
                Some(SourceFile {
                    path: entry.into_path(),
                    relative,
                    module_name,
                })
            })
            .collect();

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        files
    }

    /// Source files plus root-level manifests: the unit of cache validity.
    pub fn tracked_files(root: &Path, config: &AnalyzerConfig) -> Vec<(String, PathBuf)> {
        let mut tracked: Vec<(String, PathBuf)> = Self::discover_sources(root, config)
            .into_iter()
            .map(|f| (f.relative, f.path))
            .collect();

        for manifest in MANIFEST_FILES {
            let path = root.join(manifest);
            if path.is_file() && !tracked.iter().any(|(rel, _)| rel == manifest) {
                tracked.push((manifest.to_string(), path));
            }
        }

        tracked.sort_by(|a, b| a.0.cmp(&b.0));
        tracked
    }

    fn skip_dir(entry: &DirEntry, config: &AnalyzerConfig) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || config.is_excluded_dir(&name)
    }
}

/// `root`-relative path of `path` with `/` separators.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// `pkg/sub/mod.py` -> `pkg.sub.mod`, `pkg/__init__.py` -> `pkg`.
pub fn module_name_for(relative: &str) -> String {
    let stem = relative
        .strip_suffix(".py")
        .unwrap_or(relative);
    let mut parts: Vec<&str> = stem.split('/').collect();
    if parts.len() > 1 && parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_module_names() {
        assert_eq!(module_name_for("app.py"), "app");
        assert_eq!(module_name_for("pkg/sub/mod.py"), "pkg.sub.mod");
        assert_eq!(module_name_for("pkg/__init__.py"), "pkg");
        assert_eq!(module_name_for("__init__.py"), "__init__");
    }

    #[test]
    fn test_discovery_skips_excluded_and_hidden() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::create_dir_all(root.join("__pycache__")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("main.py"), "").unwrap();
        fs::write(root.join("pkg/__init__.py"), "").unwrap();
        fs::write(root.join("pkg/util.py"), "").unwrap();
        fs::write(root.join("__pycache__/main.py"), "").unwrap();
        fs::write(root.join(".hidden/secret.py"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let files = ProjectLoader::discover_sources(root, &AnalyzerConfig::default());
        let rels: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rels, vec!["main.py", "pkg/__init__.py", "pkg/util.py"]);
        assert_eq!(files[2].module_name, "pkg.util");
    }

    #[test]
    fn test_oversized_files_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        fs::write(dir.path().join("small.py"), "x = 1\n").unwrap();
        let config = AnalyzerConfig {
            max_file_size_bytes: 64,
            ..AnalyzerConfig::default()
        };

        let files = ProjectLoader::discover_sources(dir.path(), &config);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "small.py");
    }

    #[test]
    fn test_tracked_files_include_root_manifests() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("app.py"), "").unwrap();
        fs::write(root.join("requirements.txt"), "requests\n").unwrap();
        fs::write(root.join("setup.py"), "").unwrap();
        fs::write(root.join("sub/requirements.txt"), "").unwrap();

        let tracked = ProjectLoader::tracked_files(root, &AnalyzerConfig::default());
        let rels: Vec<&str> = tracked.iter().map(|(rel, _)| rel.as_str()).collect();
        assert_eq!(rels, vec!["app.py", "requirements.txt", "setup.py"]);
    }
}
