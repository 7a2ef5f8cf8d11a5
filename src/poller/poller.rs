use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::error::{NetworkError, PollerError};
use super::fetch::Fetch;
use super::retry::RetryPolicy;
use crate::observation::FlightObservation;
use crate::provider::{NormalizationError, ProviderId};
use crate::store::{StorageError, Store};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub flight_id: String,
    pub provider: ProviderId,
    pub interval: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub store_raw: bool,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Stored(FlightObservation),
    /// Retry budget exhausted (or a non-retryable failure); nothing was written.
    Degraded { attempts: u32, error: NetworkError },
    /// The response arrived but could not be normalized.
    Discarded(NormalizationError),
    /// The local clock reads earlier than the last stored record; nothing was written.
    ClockBehind {
        captured_at: DateTime<Utc>,
        last_stored: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub attempts: u64,
    pub stored: u64,
    pub degraded: u64,
    pub discarded: u64,
    pub clock_behind: u64,
}

/// Runs fetch, normalize and store cycles for one flight, strictly one at a time.
pub struct Poller<F> {
    config: PollerConfig,
    fetcher: F,
    store: Store,
    stats: PollStats,
}

pub struct PollerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<PollStats, PollerError>>,
}

impl<F: Fetch + 'static> Poller<F> {
    pub fn new(config: PollerConfig, fetcher: F, store: Store) -> Self {
        Self {
            config,
            fetcher,
            store,
            stats: PollStats::default(),
        }
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn spawn(self) -> PollerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(stop_rx));
        PollerHandle {
            stop_tx: Some(stop_tx),
            join,
        }
    }

    /// Polls every `interval`, measured start to start, until `stop` fires or a
    /// storage error occurs. A cycle that overruns its slot is followed by the
    /// next one immediately. The stop request is only looked at between cycles.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) -> Result<PollStats, PollerError> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Polling {} for flight {} every {:?}",
            self.config.provider,
            self.config.flight_id,
            self.config.interval
        );

        loop {
            let stopped = tokio::select! {
                biased;
                _ = &mut stop => true,
                _ = ticker.tick() => false,
            };
            if stopped {
                break;
            }
            self.run_cycle().await?;
        }

        log::info!(
            "Stopped polling flight {}: {} cycles, {} stored, {} degraded, {} discarded, {} behind the clock",
            self.config.flight_id,
            self.stats.cycles,
            self.stats.stored,
            self.stats.degraded,
            self.stats.discarded,
            self.stats.clock_behind
        );
        Ok(self.stats)
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, StorageError> {
        self.stats.cycles += 1;
        let cycle = self.stats.cycles;

        let (raw, captured_at) = match self.fetch_with_retry(cycle).await {
            Ok(fetched) => fetched,
            Err((attempts, error)) => {
                self.stats.degraded += 1;
                log::warn!(
                    "Cycle {} skipped after {} attempt(s): {}",
                    cycle,
                    attempts,
                    error
                );
                return Ok(CycleOutcome::Degraded { attempts, error });
            }
        };

        let telemetry = match self.config.provider.normalize(&raw) {
            Ok(telemetry) => telemetry,
            Err(error) => {
                self.stats.discarded += 1;
                log::warn!("Cycle {} discarded: {}", cycle, error);
                return Ok(CycleOutcome::Discarded(error));
            }
        };

        let raw_payload = self
            .config
            .store_raw
            .then(|| String::from_utf8_lossy(&raw).into_owned());
        if let Some(last_stored) = self.store.last_captured_at() {
            if captured_at < last_stored {
                self.stats.clock_behind += 1;
                log::warn!(
                    "Cycle {} skipped: clock reads {}, before the last stored record at {}",
                    cycle,
                    captured_at.to_rfc3339(),
                    last_stored.to_rfc3339()
                );
                return Ok(CycleOutcome::ClockBehind {
                    captured_at,
                    last_stored,
                });
            }
        }

        let observation = FlightObservation::from_telemetry(
            &self.config.flight_id,
            captured_at,
            telemetry,
            raw_payload,
        );
        self.store.append(&observation)?;
        self.stats.stored += 1;

        log::info!(
            "Cycle {}: lat {:?} lon {:?} alt {:?} ft speed {:?} kts eta {:?}",
            cycle,
            observation.latitude,
            observation.longitude,
            observation.altitude_ft,
            observation.ground_speed_kts,
            observation.eta
        );
        Ok(CycleOutcome::Stored(observation))
    }

    async fn fetch_with_retry(
        &mut self,
        cycle: u64,
    ) -> Result<(Vec<u8>, DateTime<Utc>), (u32, NetworkError)> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.stats.attempts += 1;
            let started = Utc::now();

            let result = match tokio::time::timeout(self.config.timeout, self.fetcher.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(NetworkError::Timeout(self.config.timeout)),
            };

            let error = match result {
                Ok(raw) => return Ok((raw, started)),
                Err(error) => error,
            };
            if !error.is_retryable() || attempt > self.config.retry.max_retries {
                return Err((attempt, error));
            }

            let delay = self.config.retry.backoff(attempt);
            log::debug!(
                "Cycle {} attempt {} failed: {}; retrying in {:?}",
                cycle,
                attempt,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl PollerHandle {
    /// Asks the poller to stop after the current cycle and waits for it.
    pub async fn stop(mut self) -> Result<PollStats, PollerError> {
        self.request_stop();
        flatten(self.join.await)
    }

    /// Asks the poller to stop after the current cycle without waiting.
    pub fn request_stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// Cancels the poller at its next suspension point. Appends are synchronous,
    /// so a record is either fully written or not at all.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Resolves when the poller ends on its own, which only happens on a fatal error.
    pub async fn finished(&mut self) -> Result<PollStats, PollerError> {
        flatten((&mut self.join).await)
    }
}

fn flatten(
    joined: Result<Result<PollStats, PollerError>, tokio::task::JoinError>,
) -> Result<PollStats, PollerError> {
    joined.map_err(|e| PollerError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{read_observations, DataFormat};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const GOGO: &str = r#"{"Response": {"flightInfo": {"latitude": 46.8, "longitude": -102.3, "altitude": 36000, "hspeed": 540}}}"#;

    enum Step {
        Reply(&'static str),
        Fail(NetworkError),
        Hang,
    }

    #[derive(Clone, Default)]
    struct Scripted {
        steps: Arc<Mutex<VecDeque<Step>>>,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Arc::new(Mutex::new(steps.into())),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for Scripted {
        async fn fetch(&self) -> Result<Vec<u8>, NetworkError> {
            self.calls.lock().unwrap().push(Instant::now());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(body)) => Ok(body.as_bytes().to_vec()),
                Some(Step::Fail(error)) => Err(error),
                Some(Step::Hang) => std::future::pending().await,
                None => Err(NetworkError::Request("script exhausted".into())),
            }
        }
    }

    fn config(interval: u64, timeout: u64, retries: u32) -> PollerConfig {
        PollerConfig {
            flight_id: "DL123_SEA_BOS".into(),
            provider: ProviderId::Gogo,
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
            retry: RetryPolicy::new(retries),
            store_raw: false,
        }
    }

    fn poller(
        dir: &tempfile::TempDir,
        config: PollerConfig,
        fetcher: Scripted,
    ) -> Poller<Scripted> {
        let store = Store::open(dir.path(), &config.flight_id, DataFormat::Json, false).unwrap();
        Poller::new(config, fetcher, store)
    }

    fn refused() -> Step {
        Step::Fail(NetworkError::Request("connection refused".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![refused(), refused(), refused(), Step::Reply(GOGO)]);
        let mut poller = poller(&dir, config(60, 5, 3), fetcher.clone());

        let outcome = poller.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Stored(_)));
        assert_eq!(fetcher.calls().len(), 4);
        assert_eq!(poller.stats().attempts, 4);
        assert_eq!(poller.store().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_degrade_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![refused(), refused(), refused(), Step::Reply(GOGO)]);
        let mut poller = poller(&dir, config(60, 5, 2), fetcher.clone());

        let outcome = poller.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Degraded { attempts: 3, .. }));
        assert_eq!(fetcher.calls().len(), 3);
        assert!(poller.store().is_empty());

        // the next cycle is unaffected
        let outcome = poller.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Stored(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![Step::Hang]);
        let mut poller = poller(&dir, config(60, 5, 0), fetcher.clone());

        let start = Instant::now();
        let outcome = poller.run_cycle().await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Degraded {
                attempts: 1,
                error: NetworkError::Timeout(_)
            }
        ));
        assert_eq!(Instant::now() - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![Step::Fail(NetworkError::Status(404)), Step::Reply(GOGO)]);
        let mut poller = poller(&dir, config(60, 5, 3), fetcher.clone());

        let outcome = poller.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Degraded { attempts: 1, .. }));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payload_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![
            Step::Reply(r#"{"Response": {"status": 503}}"#),
            Step::Reply(GOGO),
        ]);
        let mut poller = poller(&dir, config(60, 5, 3), fetcher.clone());

        assert!(matches!(
            poller.run_cycle().await.unwrap(),
            CycleOutcome::Discarded(_)
        ));
        assert_eq!(fetcher.calls().len(), 1);
        assert!(matches!(
            poller.run_cycle().await.unwrap(),
            CycleOutcome::Stored(_)
        ));
        assert_eq!(poller.stats().discarded, 1);
        assert_eq!(poller.stats().stored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn raw_payload_is_kept_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(60, 5, 0);
        config.store_raw = true;
        let mut poller = poller(&dir, config, Scripted::new(vec![Step::Reply(GOGO)]));

        let CycleOutcome::Stored(observation) = poller.run_cycle().await.unwrap() else {
            panic!("expected a stored observation");
        };
        assert_eq!(observation.raw_payload.as_deref(), Some(GOGO));
        let back = read_observations(poller.store().path(), DataFormat::Json).unwrap();
        assert_eq!(back, vec![observation]);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_cycle_keeps_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![
            Step::Reply(GOGO),
            Step::Hang,
            Step::Hang,
            Step::Hang,
            Step::Reply(GOGO),
        ]);
        let poller = poller(&dir, config(60, 5, 2), fetcher.clone());
        let path = poller.store().path().to_path_buf();

        let start = Instant::now();
        let handle = poller.spawn();
        tokio::time::sleep(Duration::from_secs(150)).await;
        let stats = handle.stop().await.unwrap();

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.stored, 2);
        assert_eq!(stats.degraded, 1);
        assert_eq!(stats.attempts, 5);

        let calls = fetcher.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0] - start, Duration::ZERO);
        assert_eq!(calls[1] - start, Duration::from_secs(60));
        assert_eq!(calls[4] - start, Duration::from_secs(120));
        assert_eq!(read_observations(&path, DataFormat::Json).unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_cycle_is_followed_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![
            Step::Hang,
            Step::Hang,
            Step::Hang,
            Step::Reply(GOGO),
            Step::Reply(GOGO),
        ]);
        let poller = poller(&dir, config(10, 5, 2), fetcher.clone());

        let handle = poller.spawn();
        tokio::time::sleep(Duration::from_secs(35)).await;
        let stats = handle.stop().await.unwrap();

        let calls = fetcher.calls();
        assert_eq!(stats.degraded, 1);
        assert!(calls[2] - calls[0] > Duration::from_secs(10));
        // cycle 2 starts the moment the last attempt of cycle 1 times out
        assert_eq!(calls[3] - calls[2], Duration::from_secs(5));
        // and the cadence restarts from there
        assert_eq!(calls[4] - calls[3], Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_behind_last_record_skips_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(60, 5, 0);
        let ahead = Utc::now() + chrono::Duration::minutes(2);
        {
            let mut store =
                Store::open(dir.path(), &config.flight_id, DataFormat::Json, false).unwrap();
            store
                .append(&FlightObservation {
                    flight_id: config.flight_id.clone(),
                    captured_at: ahead,
                    provider: ProviderId::Gogo,
                    latitude: None,
                    longitude: None,
                    altitude_ft: None,
                    ground_speed_kts: None,
                    eta: None,
                    raw_payload: None,
                })
                .unwrap();
        }

        let fetcher = Scripted::new(vec![Step::Reply(GOGO), Step::Reply(GOGO)]);
        let poller = poller(&dir, config, fetcher.clone());
        let path = poller.store().path().to_path_buf();

        let handle = poller.spawn();
        tokio::time::sleep(Duration::from_secs(90)).await;
        let stats = handle.stop().await.unwrap();

        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.clock_behind, 2);
        assert_eq!(stats.stored, 0);
        let stored = read_observations(&path, DataFormat::Json).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].captured_at, ahead);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_ends_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Scripted::new(vec![Step::Reply(GOGO)]);
        let mut poller = poller(&dir, config(60, 5, 0), fetcher);
        poller.config.flight_id = "SOMETHING_ELSE".into();

        let (_stop_tx, stop_rx) = oneshot::channel();
        let err = poller.run(stop_rx).await.unwrap_err();
        assert!(matches!(
            err,
            PollerError::Storage(StorageError::FlightMismatch { .. })
        ));
    }
}
