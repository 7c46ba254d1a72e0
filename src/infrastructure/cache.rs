//! Result Cache Module
//!
//! Persists whole-project analysis results and validates them against a
//! content-hash snapshot of the project's tracked files.
//!
//! Storage layout (sled database under the configured cache directory):
//! - tree `entries`: project key (xxh3 of the absolute project path) ->
//!   bincode-encoded `CacheEntry`
//!
//! sled applies each insert atomically, so a reader never observes a
//! half-written entry.

use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::error::CacheError;
use crate::infrastructure::snapshot::{normalize_path, project_key, ProjectSnapshot};

const ENTRIES_TREE: &str = "entries";

/// One cached project analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Version of the entry format (for future compatibility)
    pub version: u32,
    pub project_path: String,
    /// Opaque analysis result, returned byte-for-byte on a hit.
    pub payload: Vec<u8>,
    pub file_hashes: ProjectSnapshot,
    /// Unix milliseconds
    pub created_at: u64,
    pub access_count: u64,
    /// Unix milliseconds
    pub last_accessed: u64,
}

impl CacheEntry {
    pub const CURRENT_VERSION: u32 = 1;
}

/// Outcome of a cache lookup. Every variant except `Hit` is a miss.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(CacheEntry),
    /// No entry stored for this project.
    Missing,
    /// An entry exists but the project changed since it was written.
    Stale {
        previous: CacheEntry,
        current: ProjectSnapshot,
    },
    /// The stored bytes could not be read back.
    Corrupt(String),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            CacheLookup::Hit(entry) => Some(entry.payload),
            _ => None,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Missing => "missing",
            CacheLookup::Stale { .. } => "stale",
            CacheLookup::Corrupt(_) => "corrupt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
}

/// Result cache manager.
pub struct CacheManager {
    db: sled::Db,
    entries: sled::Tree,
    config: AnalyzerConfig,
    max_size_bytes: u64,
}

impl CacheManager {
    /// Open (or create) the cache under `cache_dir`. The size budget comes from
    /// `config.max_cache_size_mb`; file selection follows the same config.
    pub fn open(cache_dir: &Path, config: &AnalyzerConfig) -> Result<Self, CacheError> {
        std::fs::create_dir_all(cache_dir)?;
        let db = sled::open(cache_dir)?;
        let entries = db.open_tree(ENTRIES_TREE)?;
        Ok(Self {
            db,
            entries,
            config: config.clone(),
            max_size_bytes: config.max_cache_size_bytes(),
        })
    }

    /// Override the byte budget.
    pub fn with_size_limit(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn snapshot(&self, project_dir: &Path) -> ProjectSnapshot {
        ProjectSnapshot::capture(project_dir, &self.config)
    }

    /// Load and validate the entry for `project_dir`. A hit bumps the entry's
    /// access bookkeeping.
    pub fn lookup(&self, project_dir: &Path) -> CacheLookup {
        let key = project_key(project_dir);

        let bytes = match self.entries.get(key.as_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(target: "callscope::cache", project = %project_dir.display(), "no cache entry");
                return CacheLookup::Missing;
            }
            Err(e) => return CacheLookup::Corrupt(e.to_string()),
        };

        let mut entry: CacheEntry = match bincode::deserialize(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(target: "callscope::cache", error = %e, "cache entry could not be decoded");
                return CacheLookup::Corrupt(e.to_string());
            }
        };
        if entry.version != CacheEntry::CURRENT_VERSION {
            return CacheLookup::Corrupt(format!(
                "entry version {} does not match {}",
                entry.version,
                CacheEntry::CURRENT_VERSION
            ));
        }

        let current = self.snapshot(project_dir);
        if current != entry.file_hashes {
            debug!(
                target: "callscope::cache",
                project = %project_dir.display(),
                changed = entry.file_hashes.diff(&current).len(),
                "cache entry is stale"
            );
            return CacheLookup::Stale {
                previous: entry,
                current,
            };
        }

        entry.access_count += 1;
        entry.last_accessed = now_millis();
        if let Err(e) = self.write_entry(&key, &entry) {
            warn!(target: "callscope::cache", error = %e, "failed to record cache access");
        }

        info!(target: "callscope::cache", project = %project_dir.display(), "cache hit");
        CacheLookup::Hit(entry)
    }

    /// The cached payload if the project is unchanged since it was stored.
    pub fn get_cached_result(&self, project_dir: &Path) -> Option<Vec<u8>> {
        self.lookup(project_dir).into_payload()
    }

    /// Snapshot the project now and store `payload` against it.
    pub fn cache_result(&self, project_dir: &Path, payload: Vec<u8>) -> Result<(), CacheError> {
        let snapshot = self.snapshot(project_dir);
        self.store(project_dir, payload, snapshot)
    }

    /// Store `payload` against a snapshot the caller already captured, then
    /// evict least-recently-used entries until the budget holds.
    pub fn store(
        &self,
        project_dir: &Path,
        payload: Vec<u8>,
        snapshot: ProjectSnapshot,
    ) -> Result<(), CacheError> {
        let key = project_key(project_dir);
        let now = now_millis();
        let entry = CacheEntry {
            version: CacheEntry::CURRENT_VERSION,
            project_path: normalize_path(project_dir).to_string_lossy().into_owned(),
            payload,
            file_hashes: snapshot,
            created_at: now,
            access_count: 0,
            last_accessed: now,
        };

        self.write_entry(&key, &entry)?;
        let evicted = self.evict(&key)?;
        self.db.flush()?;

        info!(
            target: "callscope::cache",
            project = %project_dir.display(),
            files = entry.file_hashes.len(),
            evicted,
            "analysis result cached"
        );
        Ok(())
    }

    /// Remove one project's entry. Returns whether an entry existed.
    pub fn invalidate(&self, project_dir: &Path) -> Result<bool, CacheError> {
        let removed = self.entries.remove(project_key(project_dir).as_bytes())?;
        self.db.flush()?;
        Ok(removed.is_some())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear()?;
        self.db.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut entries = 0;
        let mut total_size_bytes = 0;
        for item in self.entries.iter() {
            let (_, value) = item?;
            entries += 1;
            total_size_bytes += value.len() as u64;
        }
        Ok(CacheStats {
            entries,
            total_size_bytes,
            max_size_bytes: self.max_size_bytes,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────

    fn write_entry(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let bytes = bincode::serialize(entry)?;
        self.entries.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Drop entries by oldest `last_accessed` (undecodable ones first) until
    /// the stored total fits the budget. `protect` is never evicted.
    fn evict(&self, protect: &str) -> Result<usize, CacheError> {
        let mut total: u64 = 0;
        let mut candidates: Vec<(u64, u64, String, u64)> = Vec::new();

        for item in self.entries.iter() {
            let (key, value) = item?;
            let size = value.len() as u64;
            total += size;

            let key = String::from_utf8_lossy(&key).into_owned();
            if key == protect {
                continue;
            }
            let (last_accessed, created_at) = bincode::deserialize::<CacheEntry>(&value)
                .map(|e| (e.last_accessed, e.created_at))
                .unwrap_or((0, 0));
            candidates.push((last_accessed, created_at, key, size));
        }

        if total <= self.max_size_bytes {
            return Ok(0);
        }

        candidates.sort();
        let mut evicted = 0;
        for (_, _, key, size) in candidates {
            if total <= self.max_size_bytes {
                break;
            }
            self.entries.remove(key.as_bytes())?;
            total -= size;
            evicted += 1;
            debug!(target: "callscope::cache", key = %key, size, "evicted cache entry");
        }

        if total > self.max_size_bytes {
            warn!(
                target: "callscope::cache",
                total,
                limit = self.max_size_bytes,
                "newest cache entry alone exceeds the size budget"
            );
        }
        Ok(evicted)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
