use std::time::Duration;

/// Timing policy for [`crate::application::watcher::TransactionWatcher`].
///
/// The defaults give a two minute ceiling: 60 polls, two seconds apart. A
/// terminal record stays queryable for the grace period before it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub grace_period: Duration,
}

impl WatcherConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

    /// Total time a watch may stay pending before it is reported as failed.
    pub fn timeout(&self) -> Duration {
        self.poll_interval * self.max_attempts
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            grace_period: Self::DEFAULT_GRACE_PERIOD,
        }
    }
}
