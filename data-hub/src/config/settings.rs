//! Application settings and configuration

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Database configuration
    pub database: DatabaseSettings,
    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderSettings,
    /// Daily ingestion settings
    #[serde(default)]
    pub ingestion: IngestionSettings,
    /// Gap-repair settings
    #[serde(default)]
    pub repair: RepairSettings,
    /// Corporate-actions settings
    #[serde(default)]
    pub actions: ActionsSettings,
    /// Data-quality settings
    #[serde(default)]
    pub quality: QualitySettings,
    /// Job execution settings
    #[serde(default)]
    pub jobs: JobsSettings,
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

/// Provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider to use ("yahoo" or "mock")
    #[serde(default = "default_provider_source")]
    pub source: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// Yahoo Finance configuration
    #[serde(default)]
    pub yahoo: YahooSettings,
}

fn default_provider_source() -> String {
    "yahoo".to_string()
}

fn default_provider_timeout() -> u64 {
    30
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            source: default_provider_source(),
            timeout_secs: default_provider_timeout(),
            yahoo: YahooSettings::default(),
        }
    }
}

/// Yahoo Finance provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooSettings {
    /// Base URL for the chart API
    #[serde(default = "default_yahoo_base_url")]
    pub base_url: String,
    /// Request budget per minute
    #[serde(default = "default_yahoo_requests_per_minute")]
    pub requests_per_minute: u32,
    /// User agent sent with requests
    #[serde(default = "default_yahoo_user_agent")]
    pub user_agent: String,
}

fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_yahoo_requests_per_minute() -> u32 {
    30
}

fn default_yahoo_user_agent() -> String {
    "data-hub/0.1".to_string()
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: default_yahoo_base_url(),
            requests_per_minute: default_yahoo_requests_per_minute(),
            user_agent: default_yahoo_user_agent(),
        }
    }
}

/// Daily ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSettings {
    /// Days to re-fetch on each scheduled run (catches late corrections)
    #[serde(default = "default_ingestion_lookback")]
    pub lookback_days: u32,
    /// All-or-nothing batches: one invalid bar fails the whole upsert.
    /// Off by default; the resilient per-row path keeps good rows.
    #[serde(default)]
    pub atomic_batch: bool,
}

fn default_ingestion_lookback() -> u32 {
    5
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            lookback_days: default_ingestion_lookback(),
            atomic_batch: false,
        }
    }
}

/// Gap-repair settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairSettings {
    /// Days to look back for missing sessions
    #[serde(default = "default_repair_lookback")]
    pub lookback_days: u32,
}

fn default_repair_lookback() -> u32 {
    30
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            lookback_days: default_repair_lookback(),
        }
    }
}

/// Corporate-actions settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsSettings {
    /// Days to look back for new split/dividend events on scheduled runs
    #[serde(default = "default_actions_lookback")]
    pub lookback_days: u32,
}

fn default_actions_lookback() -> u32 {
    7
}

impl Default for ActionsSettings {
    fn default() -> Self {
        Self {
            lookback_days: default_actions_lookback(),
        }
    }
}

/// Data-quality settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Days of data each check run covers
    #[serde(default = "default_quality_lookback")]
    pub lookback_days: u32,
    /// Minimum bars per month before the completeness check flags a bucket
    #[serde(default = "default_min_bars_per_month")]
    pub min_bars_per_month: i64,
    /// Daily-return z-score threshold for price anomalies
    #[serde(default = "default_price_spike_sigma")]
    pub price_spike_sigma: f64,
    /// Volume z-score threshold for volume anomalies
    #[serde(default = "default_volume_spike_sigma")]
    pub volume_spike_sigma: f64,
    /// Cap on per-issue entries stored in a finding's details
    #[serde(default = "default_max_detail_entries")]
    pub max_detail_entries: usize,
}

fn default_quality_lookback() -> u32 {
    30
}

fn default_min_bars_per_month() -> i64 {
    20
}

fn default_price_spike_sigma() -> f64 {
    5.0
}

fn default_volume_spike_sigma() -> f64 {
    10.0
}

fn default_max_detail_entries() -> usize {
    100
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            lookback_days: default_quality_lookback(),
            min_bars_per_month: default_min_bars_per_month(),
            price_spike_sigma: default_price_spike_sigma(),
            volume_spike_sigma: default_volume_spike_sigma(),
            max_detail_entries: default_max_detail_entries(),
        }
    }
}

/// Job execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsSettings {
    /// Symbols processed concurrently within one job
    #[serde(default = "default_max_concurrent_symbols")]
    pub max_concurrent_symbols: usize,
    /// Retries per symbol for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_concurrent_symbols() -> usize {
    4
}

fn default_max_retries() -> u32 {
    2
}

impl Default for JobsSettings {
    fn default() -> Self {
        Self {
            max_concurrent_symbols: default_max_concurrent_symbols(),
            max_retries: default_max_retries(),
        }
    }
}

/// Time of day (UTC) a scheduled job fires
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobTime {
    pub hour: u32,
    pub minute: u32,
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// How often the serve loop checks for due jobs
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Run every job once at startup
    #[serde(default)]
    pub run_on_startup: bool,
    /// Daily ingestion time (after market close)
    #[serde(default = "default_ingestion_at")]
    pub ingestion_at: JobTime,
    /// Daily repair time
    #[serde(default = "default_repair_at")]
    pub repair_at: JobTime,
    /// Daily corporate-actions time
    #[serde(default = "default_actions_at")]
    pub actions_at: JobTime,
    /// Daily quality-checks time
    #[serde(default = "default_quality_at")]
    pub quality_at: JobTime,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_ingestion_at() -> JobTime {
    JobTime { hour: 22, minute: 0 }
}

fn default_repair_at() -> JobTime {
    JobTime { hour: 23, minute: 0 }
}

fn default_actions_at() -> JobTime {
    JobTime { hour: 0, minute: 0 }
}

fn default_quality_at() -> JobTime {
    JobTime { hour: 1, minute: 0 }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            run_on_startup: false,
            ingestion_at: default_ingestion_at(),
            repair_at: default_repair_at(),
            actions_at: default_actions_at(),
            quality_at: default_quality_at(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("DATA_HUB")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add environment-specific configuration
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables (e.g., DATA_HUB__DATABASE__URL)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("DATA_HUB_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Create default settings (useful for testing)
    pub fn default_settings() -> Self {
        Settings {
            database: DatabaseSettings {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/data_hub".into()),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
            },
            provider: ProviderSettings::default(),
            ingestion: IngestionSettings::default(),
            repair: RepairSettings::default(),
            actions: ActionsSettings::default(),
            quality: QualitySettings::default(),
            jobs: JobsSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::default_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default_settings();
        assert_eq!(settings.database.max_connections, 10);
        assert_eq!(settings.ingestion.lookback_days, 5);
        assert!(!settings.ingestion.atomic_batch);
        assert_eq!(settings.quality.min_bars_per_month, 20);
        assert_eq!(settings.jobs.max_concurrent_symbols, 4);
    }

    #[test]
    fn test_scheduler_defaults_cover_all_jobs() {
        let scheduler = SchedulerSettings::default();
        assert_eq!(scheduler.ingestion_at.hour, 22);
        assert_eq!(scheduler.repair_at.hour, 23);
        assert_eq!(scheduler.actions_at.hour, 0);
        assert_eq!(scheduler.quality_at.hour, 1);
    }
}
