//! Typed errors for the graph and cache core.
//!
//! Application code wraps these in `anyhow::Error`; the core keeps them typed
//! so per-module failures and cache misses stay auditable.

use std::path::PathBuf;

/// Failure while walking one module's syntax during call extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("python grammar could not be loaded: {0}")]
    Grammar(String),

    #[error("module {module} contains syntax errors")]
    Syntax { module: String },

    #[error("parser produced no tree for module {module}")]
    NoTree { module: String },
}

/// Failure of the bundled source parser.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("python grammar could not be loaded: {0}")]
    Grammar(String),

    #[error("{path} could not be parsed")]
    Syntax { path: PathBuf },
}

/// Failure of the persistent cache store itself.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("cache entry encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}
