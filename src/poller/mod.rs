mod error;
mod fetch;
mod poller;
mod retry;

pub use error::{NetworkError, PollerError};
pub use fetch::{Fetch, HttpFetcher};
pub use poller::{CycleOutcome, PollStats, Poller, PollerConfig, PollerHandle};
pub use retry::RetryPolicy;
