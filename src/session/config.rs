use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use crate::poller::RetryPolicy;
use crate::provider::ProviderId;
use crate::store::DataFormat;

pub const DEFAULT_DATA_DIR: &str = "flight_data";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
const MAX_RETRIES_LIMIT: u32 = 100;

/// Command line options of `track`. Anything left unset falls back to the config
/// file, then to the built-in defaults.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct TrackArgs {
    /// Name of your flight, also the data file name so a later run can resume it
    #[arg(short = 'n', long)]
    pub flight_name: Option<String>,
    /// Inflight wifi provider to poll [default: gogo]
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderId>,
    /// Poll this URL instead of the provider's standard endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Directory to store flight data in [default: flight_data]
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
    /// Keep the verbatim provider response with every observation
    #[arg(short, long)]
    pub store_raw: bool,
    /// Storage format [default: json]
    #[arg(short = 'f', long, value_enum)]
    pub data_format: Option<DataFormat>,
    /// Time between poll starts, e.g. `30` or `1m 30s` [default: 30s]
    #[arg(short = 'i', long, value_parser = parse_duration)]
    pub scrape_interval: Option<Duration>,
    /// Timeout of a single request [default: 5s]
    #[arg(short = 't', long, value_parser = parse_duration)]
    pub scrape_timeout: Option<Duration>,
    /// Retries per poll before the poll is skipped [default: 3]
    #[arg(short = 'r', long)]
    pub scrape_max_retries: Option<u32>,
    /// Delete previously stored data of this flight before polling
    #[arg(short = 'b', long)]
    pub rebuild_db: bool,
    /// YAML file with defaults for any of the options above
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Contents of a `--config` YAML file; keys mirror the long option names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub flight_name: Option<String>,
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub store_raw: bool,
    pub data_format: Option<DataFormat>,
    pub scrape_interval: Option<DurationValue>,
    pub scrape_timeout: Option<DurationValue>,
    pub scrape_max_retries: Option<u32>,
    #[serde(default)]
    pub rebuild_db: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    fn resolve(&self, field: &'static str) -> Result<Duration, ConfigError> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => {
                parse_duration(text).map_err(|e| ConfigError::invalid(field, e))
            }
        }
    }
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Fully resolved settings of one tracking session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub flight_id: String,
    pub provider: ProviderId,
    pub endpoint: String,
    pub data_dir: PathBuf,
    pub store_raw: bool,
    pub data_format: DataFormat,
    pub scrape_interval: Duration,
    pub scrape_timeout: Duration,
    pub scrape_max_retries: u32,
    pub rebuild_db: bool,
}

impl SessionConfig {
    /// Defaults for everything except the flight.
    pub fn new(flight_id: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            flight_id: flight_id.into(),
            provider,
            endpoint: provider.endpoint().to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_raw: false,
            data_format: DataFormat::Json,
            scrape_interval: DEFAULT_INTERVAL,
            scrape_timeout: DEFAULT_TIMEOUT,
            scrape_max_retries: DEFAULT_MAX_RETRIES,
            rebuild_db: false,
        }
    }

    pub fn resolve(args: &TrackArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };
        Self::merge(args, file)
    }

    pub fn merge(args: &TrackArgs, file: ConfigFile) -> Result<Self, ConfigError> {
        let flight_id = args
            .flight_name
            .clone()
            .or(file.flight_name)
            .ok_or(ConfigError::MissingFlightName)?;

        let provider = match (args.provider, file.provider) {
            (Some(provider), _) => provider,
            (None, Some(name)) => name
                .parse()
                .map_err(|_| ConfigError::UnknownProvider(name.clone()))?,
            (None, None) => ProviderId::Gogo,
        };

        let file_interval = file
            .scrape_interval
            .map(|v| v.resolve("scrape-interval"))
            .transpose()?;
        let file_timeout = file
            .scrape_timeout
            .map(|v| v.resolve("scrape-timeout"))
            .transpose()?;

        let mut config = Self::new(flight_id, provider);
        if let Some(endpoint) = args.endpoint.clone().or(file.endpoint) {
            config.endpoint = endpoint;
        }
        if let Some(data_dir) = args.data_dir.clone().or(file.data_dir) {
            config.data_dir = data_dir;
        }
        if let Some(format) = args.data_format.or(file.data_format) {
            config.data_format = format;
        }
        if let Some(interval) = args.scrape_interval.or(file_interval) {
            config.scrape_interval = interval;
        }
        if let Some(timeout) = args.scrape_timeout.or(file_timeout) {
            config.scrape_timeout = timeout;
        }
        if let Some(retries) = args.scrape_max_retries.or(file.scrape_max_retries) {
            config.scrape_max_retries = retries;
        }
        config.store_raw = args.store_raw || file.store_raw;
        config.rebuild_db = args.rebuild_db || file.rebuild_db;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.flight_id.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("flight name", "must not be empty"));
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "flight name",
                format!("'{}' is not usable as a file name", name),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(ConfigError::invalid(
                "flight name",
                "must not contain control characters",
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data directory", "must not be empty"));
        }
        if self.scrape_interval < Duration::from_secs(1) {
            return Err(ConfigError::invalid(
                "scrape-interval",
                format!("{:?} is below one second", self.scrape_interval),
            ));
        }
        if self.scrape_timeout < Duration::from_secs(1) {
            return Err(ConfigError::invalid(
                "scrape-timeout",
                format!("{:?} is below one second", self.scrape_timeout),
            ));
        }
        if self.scrape_max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid(
                "scrape-max-retries",
                format!("{} exceeds {}", self.scrape_max_retries, MAX_RETRIES_LIMIT),
            ));
        }

        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::invalid("endpoint", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "endpoint",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.scrape_max_retries)
    }

    /// Longest a single cycle can take when every attempt times out.
    pub fn worst_case_cycle(&self) -> Duration {
        self.scrape_timeout * (self.scrape_max_retries + 1)
            + self.retry_policy().worst_case_backoff()
    }

    pub fn log_summary(&self) {
        log::info!("Configuration:");
        log::info!("-----");
        log::info!("flight name: {}", self.flight_id);
        log::info!("provider: {}", self.provider);
        log::info!("endpoint: {}", self.endpoint);
        log::info!("data dir: {}", self.data_dir.display());
        log::info!("data format: {}", self.data_format);
        log::info!("store raw: {}", self.store_raw);
        log::info!("scrape interval: {:?}", self.scrape_interval);
        log::info!("scrape timeout: {:?}", self.scrape_timeout);
        log::info!("scrape max retries: {}", self.scrape_max_retries);
        log::info!("rebuild db: {}", self.rebuild_db);
        log::info!("-----");
    }
}

/// Bare numbers are seconds; anything else goes through humantime (`90s`, `1m 30s`).
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
