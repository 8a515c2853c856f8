use thiserror::Error;

/// Failures a store operation can surface to its caller.
///
/// Load faults never appear here; they are absorbed by `initialize`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize projects: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("no project ids left to assign")]
    IdsExhausted,
}

pub type StoreResult<T> = Result<T, StoreError>;
