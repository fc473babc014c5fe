//! Event delivery errors

use std::time::Duration;

/// Errors reported by a [`Producer`](super::Producer)
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The sink answered but did not accept the event
    #[error("Event rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Producer unavailable: {0}")]
    Unavailable(String),
}

/// Why one delivery attempt failed
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    /// The producer did not answer within the per-attempt limit
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}
