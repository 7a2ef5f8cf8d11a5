use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use super::error::NormalizationError;
use super::types::ProviderId;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub(super) enum TimeFormat {
    /// RFC 3339 with an explicit offset.
    Rfc3339,
    /// RFC 3339, or a naive ISO-8601 date-time taken as UTC.
    Iso8601,
    /// Unix epoch milliseconds.
    EpochMillis,
}

/// A decoded provider response.
pub(super) struct Payload<'a> {
    provider: ProviderId,
    text: &'a str,
    value: Value,
}

impl<'a> Payload<'a> {
    pub(super) fn parse(provider: ProviderId, raw: &'a [u8]) -> Result<Self, NormalizationError> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            NormalizationError::new(
                provider,
                format!("payload is not utf-8: {}", e),
                &String::from_utf8_lossy(raw),
            )
        })?;
        let value = serde_json::from_str(text).map_err(|e| {
            NormalizationError::new(provider, format!("invalid json: {}", e), text)
        })?;
        Ok(Self {
            provider,
            text,
            value,
        })
    }

    pub(super) fn error(&self, reason: impl Into<String>) -> NormalizationError {
        NormalizationError::new(self.provider, reason, self.text)
    }

    /// Walks `path` from the document root. Every step is a required structural key.
    pub(super) fn root(&self, path: &[&str]) -> Result<Section<'_>, NormalizationError> {
        let mut current = &self.value;
        for (depth, key) in path.iter().enumerate() {
            current = current
                .get(key)
                .ok_or_else(|| self.error(format!("missing '{}'", path[..=depth].join("."))))?;
        }
        let map = current
            .as_object()
            .ok_or_else(|| self.error(format!("'{}' is not an object", path.join("."))))?;
        Ok(Section {
            payload: self,
            path: path.join("."),
            map,
            numeric_strings: false,
        })
    }
}

/// One JSON object inside a payload. Missing keys and `null` both read as absent.
pub(super) struct Section<'p> {
    payload: &'p Payload<'p>,
    path: String,
    map: &'p Map<String, Value>,
    numeric_strings: bool,
}

impl<'p> Section<'p> {
    /// Also accept numbers encoded as JSON strings.
    pub(super) fn accept_numeric_strings(mut self) -> Self {
        self.numeric_strings = true;
        self
    }

    fn field(&self, key: &str) -> Option<&'p Value> {
        match self.map.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    fn invalid(&self, key: &str, expected: &str) -> NormalizationError {
        self.payload
            .error(format!("'{}.{}' is not {}", self.path, key, expected))
    }

    pub(super) fn object(&self, key: &str) -> Result<Option<Section<'p>>, NormalizationError> {
        match self.field(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Section {
                payload: self.payload,
                path: format!("{}.{}", self.path, key),
                map,
                numeric_strings: self.numeric_strings,
            })),
            Some(_) => Err(self.invalid(key, "an object")),
        }
    }

    pub(super) fn number(&self, key: &str) -> Result<Option<f64>, NormalizationError> {
        match self.field(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a finite number")),
            Some(Value::String(s)) if self.numeric_strings => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| self.invalid(key, "a number"))
            }
            Some(_) => Err(self.invalid(key, "a number")),
        }
    }

    pub(super) fn text(&self, key: &str) -> Result<Option<&'p str>, NormalizationError> {
        match self.field(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim())),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    pub(super) fn latitude(&self, key: &str) -> Result<Option<f64>, NormalizationError> {
        self.within(key, 90.0)
    }

    pub(super) fn longitude(&self, key: &str) -> Result<Option<f64>, NormalizationError> {
        self.within(key, 180.0)
    }

    fn within(&self, key: &str, limit: f64) -> Result<Option<f64>, NormalizationError> {
        match self.number(key)? {
            Some(v) if v.abs() > limit => Err(self.payload.error(format!(
                "'{}.{}' out of range: {}",
                self.path, key, v
            ))),
            other => Ok(other),
        }
    }

    pub(super) fn timestamp(
        &self,
        key: &str,
        format: TimeFormat,
    ) -> Result<Option<DateTime<Utc>>, NormalizationError> {
        match format {
            TimeFormat::EpochMillis => {
                let Some(ms) = self.number(key)? else {
                    return Ok(None);
                };
                DateTime::from_timestamp_millis(ms as i64)
                    .map(Some)
                    .ok_or_else(|| self.invalid(key, "an epoch timestamp"))
            }
            TimeFormat::Rfc3339 => {
                let Some(s) = self.text(key)? else {
                    return Ok(None);
                };
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| Some(dt.with_timezone(&Utc)))
                    .map_err(|_| self.invalid(key, "an RFC 3339 timestamp"))
            }
            TimeFormat::Iso8601 => {
                let Some(s) = self.text(key)? else {
                    return Ok(None);
                };
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Ok(Some(dt.with_timezone(&Utc)));
                }
                NAIVE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                    .map(|naive| Some(naive.and_utc()))
                    .ok_or_else(|| self.invalid(key, "an ISO-8601 timestamp"))
            }
        }
    }
}
