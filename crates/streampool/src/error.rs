use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        source: std::io::Error,
    },

    #[error("failed to build worker runtime: {0}")]
    Runtime(std::io::Error),

    #[error("worker {index} panicked")]
    Join { index: usize },

    #[error("pool coordinator is not running")]
    Closed,
}
