pub mod observation;
pub mod poller;
pub mod provider;
pub mod session;
pub mod store;

pub use observation::{FlightObservation, Telemetry};
