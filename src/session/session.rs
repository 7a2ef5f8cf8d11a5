use std::future::Future;
use std::path::PathBuf;

use super::config::SessionConfig;
use super::error::{ConfigError, SessionError};
use crate::poller::{Fetch, HttpFetcher, PollStats, Poller, PollerConfig, PollerError};
use crate::store::Store;

/// Owns one tracked flight from configuration to shutdown.
pub struct Session {
    config: SessionConfig,
}

#[derive(Debug)]
pub struct SessionSummary {
    pub flight_id: String,
    pub path: PathBuf,
    /// Records in the file when the session ended, including earlier sessions.
    pub total_records: usize,
    pub stats: PollStats,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let worst_case = config.worst_case_cycle();
        if worst_case > config.scrape_interval {
            log::warn!(
                "A fully retried poll can take up to {:?}, longer than the {:?} interval; such cycles delay the next one",
                worst_case,
                config.scrape_interval
            );
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            flight_id: self.config.flight_id.clone(),
            provider: self.config.provider,
            interval: self.config.scrape_interval,
            timeout: self.config.scrape_timeout,
            retry: self.config.retry_policy(),
            store_raw: self.config.store_raw,
        }
    }

    pub fn open_store(&self) -> Result<Store, SessionError> {
        Store::open(
            &self.config.data_dir,
            &self.config.flight_id,
            self.config.data_format,
            self.config.rebuild_db,
        )
        .map_err(|source| SessionError::Storage {
            flight_id: self.config.flight_id.clone(),
            source,
        })
    }

    pub fn http_fetcher(&self) -> Result<HttpFetcher, SessionError> {
        HttpFetcher::new(&self.config.endpoint, self.config.scrape_timeout).map_err(|source| {
            SessionError::Http {
                provider: self.config.provider,
                source,
            }
        })
    }

    /// Polls the configured endpoint until Ctrl-C or a fatal error. A second
    /// Ctrl-C abandons the cycle in progress.
    pub async fn run(self) -> Result<SessionSummary, SessionError> {
        let fetcher = self.http_fetcher()?;
        // the second listener is only installed once the first interrupt arrived
        self.run_with(fetcher, interrupted(), interrupted()).await
    }

    /// Polls through `fetcher` until `shutdown` resolves or a fatal error occurs.
    /// On shutdown the cycle in progress is allowed to finish unless `abort`
    /// resolves first.
    pub async fn run_with<F, S, A>(
        self,
        fetcher: F,
        shutdown: S,
        abort: A,
    ) -> Result<SessionSummary, SessionError>
    where
        F: Fetch + 'static,
        S: Future<Output = ()>,
        A: Future<Output = ()>,
    {
        let store = self.open_store()?;
        let path = store.path().to_path_buf();
        let previous = store.len();

        let mut handle = Poller::new(self.poller_config(), fetcher, store).spawn();

        let finished = tokio::select! {
            _ = shutdown => None,
            result = handle.finished() => Some(result),
        };

        let result = match finished {
            Some(result) => result,
            None => {
                log::info!(
                    "Stopping flight {} after the current cycle, which can take up to {:?}; interrupt again to abort it",
                    self.config.flight_id,
                    self.config.worst_case_cycle()
                );
                handle.request_stop();
                tokio::select! {
                    result = handle.finished() => result,
                    _ = abort => {
                        log::warn!("Abandoning the cycle in progress of flight {}", self.config.flight_id);
                        handle.abort();
                        let _ = handle.finished().await;
                        Err(PollerError::Aborted("interrupted during a cycle".to_string()))
                    }
                }
            }
        };

        let flight_id = self.config.flight_id;
        match result {
            Ok(stats) => Ok(SessionSummary {
                total_records: previous + stats.stored as usize,
                flight_id,
                path,
                stats,
            }),
            Err(PollerError::Storage(source)) => Err(SessionError::Storage { flight_id, source }),
            Err(PollerError::Aborted(reason)) => Err(SessionError::Aborted { flight_id, reason }),
        }
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for Ctrl-C, run until a fatal error: {}", e);
        std::future::pending::<()>().await;
    }
}
