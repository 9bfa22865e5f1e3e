//! Service configuration loaded from `aqmon.toml`.
//!
//! Every section and field has a default, so an absent file (or a file with
//! only `[[locations]]`) still produces a complete configuration.
//!
//! ```toml
//! [source]
//! api_root = "https://api.waqi.info/feed"
//! timeout_secs = 10
//!
//! [cache]
//! ttl_secs = 600
//!
//! [[locations]]
//! id = "antalya"
//! label = "Antalya"
//! ```

use chrono::Duration;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::locations;
use crate::logging::LogLevel;
use crate::model::{AqiError, Location};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "AQMON_CONFIG";

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "aqmon.toml";

/// Longest accepted cache TTL: one day.
pub const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Longest accepted history window: thirty days.
pub const MAX_WINDOW_HOURS: i64 = 720;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub history: HistoryConfig,
    pub retry: RetryConfig,
    pub credentials: CredentialsConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Feed endpoint root; the location id and token are appended.
    pub api_root: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            api_root: "https://api.waqi.info/feed".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { ttl_secs: 600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Result<Duration, AqiError> {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                AqiError::Configuration(format!("cache.ttl_secs {} is out of range", self.ttl_secs))
            })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Trailing window shown in the trend view.
    pub window_hours: i64,
    /// Upstream readings older than this are flagged as stale.
    pub stale_after_minutes: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            window_hours: 24,
            stale_after_minutes: 180,
        }
    }
}

impl HistoryConfig {
    pub fn window(&self) -> Result<Duration, AqiError> {
        Duration::try_hours(self.window_hours).ok_or_else(|| {
            AqiError::Configuration(format!(
                "history.window_hours {} is out of range",
                self.window_hours
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first. 1 disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Flat TOML secrets file consulted when the environment has no token.
    pub secrets_file: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            secrets_file: PathBuf::from(".streamlit/secrets.toml"),
        }
    }
}

/// Which parts of each location panel are produced.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub show_components: bool,
    pub show_trend: bool,
    pub show_map: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            show_components: true,
            show_trend: true,
            show_map: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `debug`, `info`, `warn`, `error`.
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> Result<LogLevel, AqiError> {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(AqiError::Configuration(format!(
                "unknown logging level '{}'",
                other
            ))),
        }
    }
}

/// A `[[locations]]` entry. `label` falls back to the registry label, then
/// to the id itself.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LocationConfig {
    pub id: String,
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parses configuration text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Config, AqiError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| AqiError::Configuration(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load_from(path: &Path) -> Result<Config, AqiError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AqiError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Config::from_toml_str(&text)
    }

    /// Loads `$AQMON_CONFIG` if set, else `./aqmon.toml` if present, else
    /// the built-in defaults.
    pub fn load() -> Result<Config, AqiError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Config::load_from(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Config::load_from(local);
        }
        Ok(Config::default())
    }

    fn validate(&self) -> Result<(), AqiError> {
        if self.source.timeout_secs == 0 {
            return Err(AqiError::Configuration(
                "source.timeout_secs must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AqiError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.history.window_hours <= 0 || self.history.window_hours > MAX_WINDOW_HOURS {
            return Err(AqiError::Configuration(format!(
                "history.window_hours must be between 1 and {}",
                MAX_WINDOW_HOURS
            )));
        }
        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(AqiError::Configuration(format!(
                "cache.ttl_secs must be at most {}",
                MAX_CACHE_TTL_SECS
            )));
        }
        self.logging.min_level()?;
        for loc in &self.locations {
            if !locations::is_valid_feed_id(&loc.id) {
                return Err(AqiError::Configuration(format!(
                    "invalid location id '{}'",
                    loc.id
                )));
            }
        }
        Ok(())
    }

    /// The monitored locations with labels resolved, defaulting to the
    /// first registry city when none are configured.
    pub fn monitored_locations(&self) -> Vec<Location> {
        if self.locations.is_empty() {
            return vec![locations::default_location()];
        }
        self.locations
            .iter()
            .map(|l| Location {
                id: l.id.clone(),
                label: l
                    .label
                    .clone()
                    .or_else(|| locations::label_for(&l.id).map(String::from))
                    .unwrap_or_else(|| l.id.clone()),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
