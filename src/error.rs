use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Malformed {field} payload: {source}")]
    MalformedPayload {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl MetadataError {
    /// True when the caller gave up on the operation, as opposed to the store failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MetadataError::Cancelled | MetadataError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
