//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway connection settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Background refresh settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// List display limits and thresholds
    #[serde(default)]
    pub display: DisplayConfig,

    /// Dashboard aggregation settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(AppError::validation("gateway.base_url is empty"));
        }
        url::Url::parse(&self.gateway.base_url)?;
        if self.gateway.user_agent.trim().is_empty() {
            return Err(AppError::validation("gateway.user_agent is empty"));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(AppError::validation("gateway.timeout_secs must be > 0"));
        }
        if self.polling.unread_interval_secs == 0 {
            return Err(AppError::validation(
                "polling.unread_interval_secs must be > 0",
            ));
        }
        if self.display.notification_limit == 0 {
            return Err(AppError::validation(
                "display.notification_limit must be > 0",
            ));
        }
        if self.analytics.monthly_window == 0 {
            return Err(AppError::validation("analytics.monthly_window must be > 0"));
        }
        if self.analytics.top_borrowers == 0 {
            return Err(AppError::validation("analytics.top_borrowers must be > 0"));
        }
        Ok(())
    }
}

/// Gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL every service path is appended to
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Background refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between unread-count polls
    #[serde(default = "defaults::unread_interval")]
    pub unread_interval_secs: u64,
}

impl PollingConfig {
    pub fn unread_interval(&self) -> Duration {
        Duration::from_secs(self.unread_interval_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            unread_interval_secs: defaults::unread_interval(),
        }
    }
}

/// List display limits and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Most notifications shown in the dropdown
    #[serde(default = "defaults::notification_limit")]
    pub notification_limit: usize,

    /// A reservation expiring within this many days is flagged
    #[serde(default = "defaults::expiring_soon_days")]
    pub expiring_soon_days: i64,

    /// Rows in the dashboard's recent activity list
    #[serde(default = "defaults::recent_activity_limit")]
    pub recent_activity_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            notification_limit: defaults::notification_limit(),
            expiring_soon_days: defaults::expiring_soon_days(),
            recent_activity_limit: defaults::recent_activity_limit(),
        }
    }
}

/// Dashboard aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of trailing calendar months in the time series
    #[serde(default = "defaults::monthly_window")]
    pub monthly_window: u32,

    /// Length of the top borrowers leaderboard
    #[serde(default = "defaults::top_borrowers")]
    pub top_borrowers: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            monthly_window: defaults::monthly_window(),
            top_borrowers: defaults::top_borrowers(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Gateway defaults
    pub fn base_url() -> String {
        "http://localhost:8080/api".into()
    }
    pub fn user_agent() -> String {
        concat!("lending-sync/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        10
    }

    // Polling defaults
    pub fn unread_interval() -> u64 {
        30
    }

    // Display defaults
    pub fn notification_limit() -> usize {
        50
    }
    pub fn expiring_soon_days() -> i64 {
        2
    }
    pub fn recent_activity_limit() -> usize {
        10
    }

    // Analytics defaults
    pub fn monthly_window() -> u32 {
        6
    }
    pub fn top_borrowers() -> usize {
        5
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
