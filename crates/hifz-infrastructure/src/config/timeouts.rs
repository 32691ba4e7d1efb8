use std::time::Duration;

/// Timeout durations used across the sync pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// How long a push channel may take to connect before polling takes over
    pub realtime_connect: Duration,

    /// Interval between full refetches while polling
    pub poll_interval: Duration,

    /// HTTP request timeout
    pub http_request: Duration,

    /// Database connect timeout
    pub db_connect: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        GLOBAL_TIMEOUT_CONFIG.clone()
    }
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the global timeout configuration
    pub fn global() -> &'static Self {
        &GLOBAL_TIMEOUT_CONFIG
    }
}

static GLOBAL_TIMEOUT_CONFIG: TimeoutConfig = TimeoutConfig {
    realtime_connect: Duration::from_secs(5),
    poll_interval: Duration::from_secs(30),
    http_request: Duration::from_secs(30),
    db_connect: Duration::from_secs(10),
};
