mod config;
mod error;
mod session;

pub use config::{
    parse_duration, ConfigFile, DurationValue, SessionConfig, TrackArgs, DEFAULT_DATA_DIR,
    DEFAULT_INTERVAL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT,
};
pub use error::{ConfigError, SessionError};
pub use session::{Session, SessionSummary};
