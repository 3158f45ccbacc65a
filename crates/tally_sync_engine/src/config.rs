//! Configuration for the sync engine.

use rand::Rng;
use std::time::Duration;
use tally_sync_protocol::{ConflictPolicy, DEFAULT_PAGE_SIZE};

/// Configuration for sync attempts and auto sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How conflicting edits are settled.
    pub conflict_policy: ConflictPolicy,
    /// Period of the auto-sync timer; `None` disables the timer.
    pub auto_sync_interval: Option<Duration>,
    /// Whether regaining connectivity triggers an auto sync.
    pub sync_on_reconnect: bool,
    /// Buffer size of the status broadcast channel.
    pub status_capacity: usize,
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            conflict_policy: ConflictPolicy::ServerWins,
            auto_sync_interval: Some(Duration::from_secs(15 * 60)),
            sync_on_reconnect: true,
            status_capacity: 16,
        }
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Sets the auto-sync timer period.
    pub fn with_auto_sync_interval(mut self, interval: Duration) -> Self {
        self.auto_sync_interval = Some(interval);
        self
    }

    /// Disables the auto-sync timer; reconnect triggers still apply.
    pub fn without_auto_sync_interval(mut self) -> Self {
        self.auto_sync_interval = None;
        self
    }

    /// Sets whether regaining connectivity triggers a sync.
    pub fn with_sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.sync_on_reconnect = enabled;
        self
    }

    /// Sets the status channel capacity.
    pub fn with_status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the HTTP remote client.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the records API (e.g., "https://api.example.com").
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry configuration for retryable failures.
    pub retry: RetryConfig,
    /// Records requested per listing page.
    pub page_size: usize,
}

impl RemoteConfig {
    /// Creates a new remote configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the listing page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter && delay_secs > 0.0 {
            // Up to 25% extra.
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_conflict_policy(ConflictPolicy::Manual)
            .with_auto_sync_interval(Duration::from_secs(60))
            .with_sync_on_reconnect(false)
            .with_status_capacity(0);

        assert_eq!(config.conflict_policy, ConflictPolicy::Manual);
        assert_eq!(config.auto_sync_interval, Some(Duration::from_secs(60)));
        assert!(!config.sync_on_reconnect);
        assert_eq!(config.status_capacity, 1);

        let config = config.without_auto_sync_interval();
        assert!(config.auto_sync_interval.is_none());
    }

    #[test]
    fn sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.conflict_policy, ConflictPolicy::ServerWins);
        assert!(config.sync_on_reconnect);
    }

    #[test]
    fn remote_config_builder() {
        let config = RemoteConfig::new("https://api.example.com")
            .with_timeout(Duration::from_secs(5))
            .with_page_size(0)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.page_size, 1);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
        assert!(delay2 <= Duration::from_millis(250));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn no_retry_has_single_attempt() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }
}
