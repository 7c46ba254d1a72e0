//! Worker pool management for callscope.
//! Call extraction runs on a local rayon pool so callers keep the global pool.

use anyhow::Result;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::info;

/// Build the extraction pool. `threads` defaults to every available core.
pub fn build_worker_pool(threads: Option<usize>) -> Result<ThreadPool> {
    let cores = num_cpus::get();
    let workers = threads.unwrap_or(cores).max(1);

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("callscope-extract-{}", i))
        .build()?;

    info!(
        target: "callscope::pool",
        workers,
        cores,
        "initialized extraction pool"
    );

    Ok(pool)
}
