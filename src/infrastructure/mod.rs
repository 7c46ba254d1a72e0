// Infrastructure for callscope: project discovery, parsing, hashing and caching.

pub mod cache;
pub mod concurrency;
pub mod incremental;
pub mod project_loader;
pub mod python_parser;
pub mod snapshot;

pub use cache::{CacheLookup, CacheManager};
pub use incremental::IncrementalAnalyzer;
pub use project_loader::ProjectLoader;
pub use python_parser::PythonModuleParser;
