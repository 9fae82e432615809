//! Shared environment configuration for the bumpity binaries.
//!
//! Consolidates the `RUST_LOG`, `RAYON_NUM_THREADS` and `BUMPITY_PORT` reads
//! shared by `bumpity` and `bumpity-server`.

use crate::constants::DEFAULT_PORT;

/// Initialize `env_logger`, defaulting to `info` unless `RUST_LOG` is set.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Read `RAYON_NUM_THREADS` (fallback `OMP_NUM_THREADS`). Without either,
/// rayon picks the thread count. Tolerates an already-initialized pool.
/// Returns the thread count in use.
pub fn init_rayon_threads() -> usize {
    let requested = std::env::var("RAYON_NUM_THREADS")
        .or_else(|_| std::env::var("OMP_NUM_THREADS"))
        .ok()
        .and_then(|s| s.parse::<usize>().ok());
    if let Some(num_threads) = requested {
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
        {
            log::warn!("could not configure rayon with {} threads: {}", num_threads, err);
        }
    }
    let num_threads = rayon::current_num_threads();
    log::info!("Rayon threads: {}", num_threads);
    num_threads
}

/// Read `BUMPITY_PORT` (default 9000).
pub fn server_port() -> u16 {
    std::env::var("BUMPITY_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
