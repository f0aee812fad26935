pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`workers` must be a positive integer")]
    InvalidWorkers,

    #[error("duration {0:?} is too large")]
    InvalidDuration(std::time::Duration),

    #[error("invalid latency histogram: {0}")]
    InvalidHistogram(String),

    #[error("expected stats from {expected} workers, received {received}")]
    MissingWorkers { expected: u64, received: u64 },
}
