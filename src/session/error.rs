use thiserror::Error;

use crate::provider::ProviderId;
use crate::store::StorageError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("--flight-name is required")]
    MissingFlightName,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures that end a tracking session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("storage failure for flight {flight_id}: {source}")]
    Storage {
        flight_id: String,
        source: StorageError,
    },
    #[error("cannot set up HTTP client for {provider}: {source}")]
    Http {
        provider: ProviderId,
        source: reqwest::Error,
    },
    #[error("poller for flight {flight_id} aborted: {reason}")]
    Aborted { flight_id: String, reason: String },
}
