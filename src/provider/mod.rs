mod american;
mod delta;
mod error;
mod fields;
mod gogo;
mod types;
mod united;
pub mod units;

pub use error::NormalizationError;
pub use types::ProviderId;

use crate::observation::Telemetry;
use fields::Payload;

/// Maps one raw provider response to telemetry in canonical units.
///
/// Individually missing fields come back as `None`. Undecodable payloads, missing
/// structural keys and wrongly typed fields are a [`NormalizationError`].
pub fn normalize(raw: &[u8], provider: ProviderId) -> Result<Telemetry, NormalizationError> {
    let payload = Payload::parse(provider, raw)?;
    let telemetry = match provider {
        ProviderId::Gogo => gogo::normalize(&payload),
        ProviderId::Delta => delta::normalize(&payload),
        ProviderId::United => united::normalize(&payload),
        ProviderId::American => american::normalize(&payload),
    }?;

    // A huge reported value can overflow during unit conversion.
    for (field, value) in [
        ("altitude", telemetry.altitude_ft),
        ("ground speed", telemetry.ground_speed_kts),
    ] {
        if let Some(v) = value.filter(|v| !v.is_finite()) {
            return Err(payload.error(format!("{} is out of range ({})", field, v)));
        }
    }
    Ok(telemetry)
}

impl ProviderId {
    pub fn normalize(&self, raw: &[u8]) -> Result<Telemetry, NormalizationError> {
        normalize(raw, *self)
    }
}
