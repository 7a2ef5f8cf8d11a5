//! American (Viasat) flight responses: `data`, altitude in meters, speed already in knots.

use super::fields::{Payload, TimeFormat};
use super::{units, NormalizationError, ProviderId};
use crate::observation::Telemetry;

pub(super) fn normalize(payload: &Payload) -> Result<Telemetry, NormalizationError> {
    let data = payload.root(&["data"])?;

    Ok(Telemetry {
        provider: ProviderId::American,
        latitude: data.latitude("lat")?,
        longitude: data.longitude("lng")?,
        altitude_ft: data.number("altitude")?.map(units::meters_to_feet),
        ground_speed_kts: data.number("groundSpeed")?,
        eta: data.timestamp("eta", TimeFormat::Rfc3339)?,
    })
}
