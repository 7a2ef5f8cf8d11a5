//! GoGo `statusTray` responses: `Response.flightInfo`, speed in mph, altitude in feet.

use super::fields::{Payload, TimeFormat};
use super::{units, NormalizationError, ProviderId};
use crate::observation::Telemetry;

pub(super) fn normalize(payload: &Payload) -> Result<Telemetry, NormalizationError> {
    let info = payload.root(&["Response", "flightInfo"])?;

    Ok(Telemetry {
        provider: ProviderId::Gogo,
        latitude: info.latitude("latitude")?,
        longitude: info.longitude("longitude")?,
        altitude_ft: info.number("altitude")?,
        ground_speed_kts: info.number("hspeed")?.map(units::mph_to_knots),
        eta: info.timestamp("expectedArrival", TimeFormat::Rfc3339)?,
    })
}
