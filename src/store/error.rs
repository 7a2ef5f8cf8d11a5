use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("corrupt record in {path} line {line}: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },
    #[error("observation captured at {next} is older than last stored record ({last})")]
    OutOfOrder {
        last: DateTime<Utc>,
        next: DateTime<Utc>,
    },
    #[error("observation for flight '{found}' appended to store of '{expected}'")]
    FlightMismatch { expected: String, found: String },
}
