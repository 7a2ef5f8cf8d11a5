use thiserror::Error;

use super::types::ProviderId;

const EXCERPT_LEN: usize = 160;

/// A provider response we could not turn into telemetry.
#[derive(Debug, Error)]
#[error("{provider} payload rejected: {reason} (payload: {excerpt})")]
pub struct NormalizationError {
    pub provider: ProviderId,
    pub reason: String,
    pub excerpt: String,
}

impl NormalizationError {
    pub fn new(provider: ProviderId, reason: impl Into<String>, payload: &str) -> Self {
        Self {
            provider,
            reason: reason.into(),
            excerpt: excerpt(payload),
        }
    }
}

fn excerpt(payload: &str) -> String {
    let trimmed = payload.trim();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
