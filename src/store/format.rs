use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::error::StorageError;
use crate::observation::FlightObservation;
use crate::provider::ProviderId;

pub const CSV_HEADER: &str = "flight_id,captured_at,provider,latitude,longitude,altitude_ft,ground_speed_kts,eta,raw_payload";

/// On-disk layout of a flight's observations. Both variants keep exactly one record per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataFormat {
    /// One JSON object per line, absent values are `null`.
    Json,
    /// Comma separated with a header row, absent values are empty fields.
    Csv,
}

impl DataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Json => "jsonl",
            DataFormat::Csv => "csv",
        }
    }

    pub fn header(&self) -> Option<&'static str> {
        match self {
            DataFormat::Json => None,
            DataFormat::Csv => Some(CSV_HEADER),
        }
    }

    /// Serializes one record including its line terminator.
    pub fn encode(&self, observation: &FlightObservation) -> Result<Vec<u8>, StorageError> {
        match self {
            DataFormat::Json => {
                let mut line = serde_json::to_vec(observation)?;
                line.push(b'\n');
                Ok(line)
            }
            DataFormat::Csv => {
                let mut writer = csv::WriterBuilder::new()
                    .has_headers(false)
                    .terminator(csv::Terminator::Any(b'\n'))
                    .from_writer(Vec::new());
                writer.serialize(CsvRow::from_observation(observation)?)?;
                writer.into_inner().map_err(|e| e.into_error().into())
            }
        }
    }

    /// Parses one line without its terminator.
    pub fn decode(&self, line: &str) -> Result<FlightObservation, String> {
        match self {
            DataFormat::Json => serde_json::from_str(line).map_err(|e| e.to_string()),
            DataFormat::Csv => {
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .from_reader(line.as_bytes());
                let row: CsvRow = reader
                    .deserialize()
                    .next()
                    .ok_or_else(|| "empty record".to_string())?
                    .map_err(|e| e.to_string())?;
                row.into_observation()
            }
        }
    }
}

/// CSV shape of an observation. The raw payload is kept as a JSON string literal
/// so embedded newlines never split a record and an empty payload stays distinct
/// from an absent one.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    flight_id: String,
    captured_at: DateTime<Utc>,
    provider: ProviderId,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude_ft: Option<f64>,
    ground_speed_kts: Option<f64>,
    eta: Option<DateTime<Utc>>,
    raw_payload: Option<String>,
}

impl CsvRow {
    fn from_observation(o: &FlightObservation) -> Result<Self, StorageError> {
        Ok(Self {
            flight_id: o.flight_id.clone(),
            captured_at: o.captured_at,
            provider: o.provider,
            latitude: o.latitude,
            longitude: o.longitude,
            altitude_ft: o.altitude_ft,
            ground_speed_kts: o.ground_speed_kts,
            eta: o.eta,
            raw_payload: o
                .raw_payload
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }

    fn into_observation(self) -> Result<FlightObservation, String> {
        let raw_payload = self
            .raw_payload
            .map(|s| serde_json::from_str::<String>(&s))
            .transpose()
            .map_err(|e| format!("raw_payload: {}", e))?;
        Ok(FlightObservation {
            flight_id: self.flight_id,
            captured_at: self.captured_at,
            provider: self.provider,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude_ft: self.altitude_ft,
            ground_speed_kts: self.ground_speed_kts,
            eta: self.eta,
            raw_payload,
        })
    }
}
