use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::{info, warn};

const CONFIG_FILE: &str = "app_config.json";

/// Log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Persistent configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    log_level: LogLevel,
    leaderboard_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            leaderboard_enabled: true,
        }
    }
}

/// Application settings persisted as JSON in the config directory
pub struct ConfigService {
    log_level: AtomicU8,
    leaderboard_enabled: AtomicBool,
    config_path: PathBuf,
}

impl ConfigService {
    /// Load `app_config.json` from `config_dir`, creating the directory if
    /// needed. A missing or unreadable file yields defaults.
    pub fn new(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir)?;
        let config_path = config_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            match std::fs::read_to_string(&config_path)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<AppConfig>(&content)?))
            {
                Ok(config) => config,
                Err(e) => {
                    warn!("Config at {:?} unreadable, using defaults: {}", config_path, e);
                    AppConfig::default()
                }
            }
        } else {
            AppConfig::default()
        };

        info!("📁 Config loaded from: {:?}", config_path);
        info!("🔧 Initial log level: {}", config.log_level.as_str());

        Ok(Self {
            log_level: AtomicU8::new(config.log_level as u8),
            leaderboard_enabled: AtomicBool::new(config.leaderboard_enabled),
            config_path,
        })
    }

    pub fn get_log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.log_level.load(Ordering::Relaxed))
    }

    /// Takes effect on next start
    pub fn set_log_level(&self, level: LogLevel) -> Result<()> {
        info!("🔧 Changing log level to: {}", level.as_str());
        self.log_level.store(level as u8, Ordering::Relaxed);
        self.persist()
    }

    pub fn leaderboard_enabled(&self) -> bool {
        self.leaderboard_enabled.load(Ordering::Relaxed)
    }

    pub fn set_leaderboard_enabled(&self, enabled: bool) -> Result<()> {
        self.leaderboard_enabled.store(enabled, Ordering::Relaxed);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let config = AppConfig {
            log_level: self.get_log_level(),
            leaderboard_enabled: self.leaderboard_enabled(),
        };

        let content = serde_json::to_string_pretty(&config)?;
        std::fs::write(&self.config_path, content)?;

        info!("💾 Config saved to: {:?}", self.config_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::from_u8(1), LogLevel::Error);
        assert_eq!(LogLevel::from_u8(3), LogLevel::Info);
        assert_eq!(LogLevel::from_u8(5), LogLevel::Trace);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Info);
    }

    #[test]
    fn test_settings_survive_reload() {
        let dir = tempfile::tempdir().unwrap();

        let service = ConfigService::new(dir.path()).unwrap();
        assert_eq!(service.get_log_level(), LogLevel::Info);
        assert!(service.leaderboard_enabled());

        service.set_log_level(LogLevel::Debug).unwrap();
        service.set_leaderboard_enabled(false).unwrap();

        let reloaded = ConfigService::new(dir.path()).unwrap();
        assert_eq!(reloaded.get_log_level(), LogLevel::Debug);
        assert!(!reloaded.leaderboard_enabled());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{{").unwrap();

        let service = ConfigService::new(dir.path()).unwrap();
        assert_eq!(service.get_log_level(), LogLevel::Info);
        assert!(service.leaderboard_enabled());
    }
}
