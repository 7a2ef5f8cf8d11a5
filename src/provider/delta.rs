//! Delta `flight-data` responses.
//!
//! Position lives in a nested `position` object that is dropped entirely while the
//! aircraft has no GPS fix. Altitude is metric, speed is km/h and the ETA is epoch millis.

use super::fields::{Payload, TimeFormat};
use super::{units, NormalizationError, ProviderId};
use crate::observation::Telemetry;

pub(super) fn normalize(payload: &Payload) -> Result<Telemetry, NormalizationError> {
    let data = payload.root(&["flightData"])?;

    let (latitude, longitude) = match data.object("position")? {
        Some(position) => (position.latitude("lat")?, position.longitude("lon")?),
        None => (None, None),
    };

    Ok(Telemetry {
        provider: ProviderId::Delta,
        latitude,
        longitude,
        altitude_ft: data.number("altitude")?.map(units::meters_to_feet),
        ground_speed_kts: data.number("groundSpeed")?.map(units::kmh_to_knots),
        eta: data.timestamp("estimatedArrivalUtc", TimeFormat::EpochMillis)?,
    })
}
