use std::time::Duration;
use thiserror::Error;

use crate::store::StorageError;

/// Statuses worth asking again for; everything else fails the cycle right away.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl NetworkError {
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Status(code) => RETRYABLE_STATUSES.contains(code),
            _ => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("poller task aborted: {0}")]
    Aborted(String),
}
