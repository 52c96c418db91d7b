//! Error types for starforge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing input at enqueue time. Rejected synchronously,
    /// never enters the queue.
    #[error("validation error: {0}")]
    Validation(String),

    /// The queue's backing store cannot be reached. Enqueue fails
    /// loudly; the caller must retry later.
    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The generation backend returned a non-success response.
    #[error("generation backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    /// Network failure or timeout talking to the generation backend.
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Object store write or read failed.
    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a re-lease of the same item has a realistic chance of
    /// succeeding. Transient backend and store failures are retryable;
    /// the queue's bounded attempt count decides when to give up.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::BackendUnavailable(_) => true,
            Error::Backend { status, .. } => *status >= 500,
            Error::Database(_) | Error::QueueUnavailable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
