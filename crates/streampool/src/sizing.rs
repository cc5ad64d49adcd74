//! Pool sizing from host parallelism.

/// Host cores per worker. Leaves headroom for the coordinator and the rest
/// of the process.
pub const CORES_PER_WORKER: f64 = 1.5;

/// Number of cores the host reports, or 1 if it can't tell.
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Worker count: `min(cap, round(cores / 1.5))`, never below 1.
pub fn pool_size(cores: usize, cap: usize) -> usize {
    let derived = (cores as f64 / CORES_PER_WORKER).round() as usize;
    derived.min(cap).max(1)
}
