use rand::Rng;
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// How often, and how patiently, a single cycle re-attempts a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Delay before retry number `retry` (1-based): exponential, capped, equal jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let capped = self
            .base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay);
        let half = capped / 2;
        let jitter = rand::rng().random_range(0..=half.as_millis() as u64);
        half + Duration::from_millis(jitter)
    }

    /// Longest time one cycle can spend on backoff sleeps.
    pub fn worst_case_backoff(&self) -> Duration {
        (1..=self.max_retries)
            .map(|retry| {
                self.base_delay
                    .saturating_mul(1 << retry.saturating_sub(1).min(16))
                    .min(self.max_delay)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_within_bounds() {
        let policy = RetryPolicy::new(10);
        for (retry, ceiling) in [(1, 1_000), (2, 2_000), (3, 4_000), (5, 16_000), (6, 30_000), (10, 30_000)] {
            for _ in 0..50 {
                let delay = policy.backoff(retry).as_millis() as u64;
                assert!(delay >= ceiling / 2, "retry {retry}: {delay}");
                assert!(delay <= ceiling, "retry {retry}: {delay}");
            }
        }
    }

    #[test]
    fn huge_retry_numbers_do_not_overflow() {
        let policy = RetryPolicy::new(u32::MAX);
        assert!(policy.backoff(u32::MAX) <= DEFAULT_MAX_DELAY);
    }

    #[test]
    fn worst_case_sums_capped_delays() {
        assert_eq!(RetryPolicy::new(0).worst_case_backoff(), Duration::ZERO);
        assert_eq!(RetryPolicy::new(3).worst_case_backoff(), Duration::from_secs(7));
        assert_eq!(RetryPolicy::new(7).worst_case_backoff(), Duration::from_secs(1 + 2 + 4 + 8 + 16 + 30 + 30));
    }
}
