use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Telemetry as reported by one provider response, already in feet and knots.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub provider: ProviderId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_ft: Option<f64>,
    pub ground_speed_kts: Option<f64>,
    pub eta: Option<DateTime<Utc>>,
}

/// One stored snapshot of a tracked flight.
///
/// `captured_at` is our own clock at the time of the poll, never the provider's.
/// Absent telemetry stays `None`; a reported zero is a real measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightObservation {
    pub flight_id: String,
    pub captured_at: DateTime<Utc>,
    pub provider: ProviderId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_ft: Option<f64>,
    pub ground_speed_kts: Option<f64>,
    pub eta: Option<DateTime<Utc>>,
    pub raw_payload: Option<String>,
}

impl FlightObservation {
    pub fn from_telemetry(
        flight_id: &str,
        captured_at: DateTime<Utc>,
        telemetry: Telemetry,
        raw_payload: Option<String>,
    ) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            captured_at,
            provider: telemetry.provider,
            latitude: telemetry.latitude,
            longitude: telemetry.longitude,
            altitude_ft: telemetry.altitude_ft,
            ground_speed_kts: telemetry.ground_speed_kts,
            eta: telemetry.eta,
            raw_payload,
        }
    }
}
