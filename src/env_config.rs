//! Shared environment configuration for the reimburse binaries.
//!
//! Consolidates `REIMBURSE_MODEL_PATH` and `RAYON_NUM_THREADS` reads.

use std::path::PathBuf;

use crate::constants::DEFAULT_MODEL_PATH;

pub const MODEL_PATH_VAR: &str = "REIMBURSE_MODEL_PATH";

/// Read `REIMBURSE_MODEL_PATH` (default `data/residual_model.json`).
pub fn model_path() -> PathBuf {
    std::env::var_os(MODEL_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH))
}

/// Read `RAYON_NUM_THREADS` (fallback `OMP_NUM_THREADS`, default 8).
pub fn rayon_threads() -> usize {
    std::env::var("RAYON_NUM_THREADS")
        .or_else(|_| std::env::var("OMP_NUM_THREADS"))
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(8)
}

/// Build the rayon global pool from [`rayon_threads`], tolerating an
/// already-initialized pool. Returns thread count.
pub fn init_rayon_threads_lenient() -> usize {
    let num_threads = rayon_threads();
    if rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .is_err()
    {
        log::debug!("rayon pool already initialized");
    }
    log::info!("rayon threads: {}", num_threads);
    num_threads
}

/// Initialize `env_logger` on stderr, defaulting to `warn` unless `RUST_LOG`
/// says otherwise.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .try_init();
}
