//! United `getAllSessionData` responses. Numbers frequently arrive as strings.

use super::fields::{Payload, TimeFormat};
use super::{units, NormalizationError, ProviderId};
use crate::observation::Telemetry;

pub(super) fn normalize(payload: &Payload) -> Result<Telemetry, NormalizationError> {
    let info = payload
        .root(&["result", "flightInfo"])?
        .accept_numeric_strings();

    Ok(Telemetry {
        provider: ProviderId::United,
        latitude: info.latitude("latitude")?,
        longitude: info.longitude("longitude")?,
        altitude_ft: info.number("altitude")?,
        ground_speed_kts: info.number("groundSpeed")?.map(units::mph_to_knots),
        eta: info.timestamp("estimatedArrivalTime", TimeFormat::Iso8601)?,
    })
}
