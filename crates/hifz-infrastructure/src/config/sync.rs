use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::http::RetryConfig;

pub const REMOTE_URL_ENV: &str = "HIFZ_REMOTE_URL";
pub const REMOTE_KEY_ENV: &str = "HIFZ_REMOTE_KEY";

/// Settings for talking to the remote leaderboard store
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the PostgREST deployment. `None` runs offline.
    pub remote_url: Option<String>,
    /// Anonymous API key sent as `apikey` and bearer token
    pub api_key: String,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
    /// Rows fetched for a leaderboard view
    pub leaderboard_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: String::new(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            leaderboard_limit: 10,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            remote_url: non_blank(REMOTE_URL_ENV).map(|url| url.trim_end_matches('/').to_string()),
            api_key: non_blank(REMOTE_KEY_ENV).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn is_offline(&self) -> bool {
        self.remote_url.is_none()
    }

    pub fn connect_deadline(&self) -> Duration {
        self.timeouts.realtime_connect
    }

    pub fn poll_interval(&self) -> Duration {
        self.timeouts.poll_interval
    }
}
