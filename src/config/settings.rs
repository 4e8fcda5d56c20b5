use crate::alerts::AlertThresholds;
use crate::dashboard::THINGSPEAK_UPDATE_URL;
use crate::error::ConfigError;
use crate::monitor::MonitorSettings;
use crate::scheduler::ReportSchedule;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `dashboard.api_key`
pub const ENV_THINGSPEAK_API_KEY: &str = "THINGSPEAK_API_KEY";
/// Environment variable overriding `notifications.webhook_url`
pub const ENV_NOTIFY_WEBHOOK: &str = "PITHERM_NOTIFY_WEBHOOK";
/// Environment variable overriding `report.webhook_url`
pub const ENV_REPORT_WEBHOOK: &str = "PITHERM_REPORT_WEBHOOK";

/// Top-level configuration, read once at startup
///
/// Every section is optional in the file; missing sections and keys take
/// the values of their `Default` implementation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub thresholds: ThresholdsConfig,
    pub sampling: SamplingConfig,
    pub storage: StorageConfig,
    pub report: ReportConfig,
    pub notifications: NotificationsConfig,
    pub dashboard: DashboardConfig,
    pub health: HealthConfig,
}

/// Alert thresholds in °C
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub high: f64,
    pub low: f64,
    pub hysteresis: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        let defaults = AlertThresholds::default();
        Self {
            high: defaults.high,
            low: defaults.low,
            hysteresis: defaults.hysteresis,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub sample_interval_seconds: u64,
    pub log_interval_seconds: u64,
    pub max_consecutive_sensor_failures: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_interval_seconds: 30,
            log_interval_seconds: 300,
            max_consecutive_sensor_failures: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root holding `current/`, `archive/` and the report marker
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub day_of_month: u32,
    pub hour: u32,
    pub check_interval_seconds: u64,
    /// Reports are only logged when unset
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let schedule = ReportSchedule::default();
        Self {
            day_of_month: schedule.day_of_month,
            hour: schedule.hour,
            check_interval_seconds: 60,
            webhook_url: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Alerts are only logged when unset
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// ThingSpeak write key; uploads are disabled without one
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: THINGSPEAK_UPDATE_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// 0 disables the heartbeat
    pub heartbeat_interval_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 3600,
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// * `ConfigError::ReadError` if the file cannot be read
    /// * `ConfigError::TomlError` if it is not valid TOML for this schema
    /// * `ConfigError::ValidationError` if a value is out of range
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`; blank values are ignored
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup(ENV_THINGSPEAK_API_KEY) {
            debug!("Dashboard API key taken from {}", ENV_THINGSPEAK_API_KEY);
            self.dashboard.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_NOTIFY_WEBHOOK) {
            debug!("Notification webhook taken from {}", ENV_NOTIFY_WEBHOOK);
            self.notifications.webhook_url = Some(url);
        }
        if let Some(url) = lookup(ENV_REPORT_WEBHOOK) {
            debug!("Report webhook taken from {}", ENV_REPORT_WEBHOOK);
            self.report.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alert_thresholds()?;

        if self.sampling.sample_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "sampling.sample_interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.report.check_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "report.check_interval_seconds must be greater than 0".to_string(),
            ));
        }
        // Every month has days 1 through 28
        if !(1..=28).contains(&self.report.day_of_month) {
            return Err(ConfigError::ValidationError(format!(
                "report.day_of_month must be between 1 and 28, got {}",
                self.report.day_of_month
            )));
        }
        if self.report.hour > 23 {
            return Err(ConfigError::ValidationError(format!(
                "report.hour must be between 0 and 23, got {}",
                self.report.hour
            )));
        }
        if self.storage.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.log_dir must not be empty".to_string(),
            ));
        }
        if self.dashboard.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "dashboard.endpoint must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn alert_thresholds(&self) -> Result<AlertThresholds, ConfigError> {
        AlertThresholds::new(
            self.thresholds.high,
            self.thresholds.low,
            self.thresholds.hysteresis,
        )
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        let heartbeat = self.health.heartbeat_interval_seconds;
        MonitorSettings {
            sample_interval: Duration::from_secs(self.sampling.sample_interval_seconds),
            log_interval: Duration::from_secs(self.sampling.log_interval_seconds),
            max_consecutive_sensor_failures: self.sampling.max_consecutive_sensor_failures,
            heartbeat_interval: (heartbeat > 0).then(|| Duration::from_secs(heartbeat)),
        }
    }

    pub fn report_schedule(&self) -> ReportSchedule {
        ReportSchedule {
            day_of_month: self.report.day_of_month,
            hour: self.report.hour,
        }
    }

    pub fn report_check_interval(&self) -> Duration {
        Duration::from_secs(self.report.check_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.alert_thresholds().unwrap(), AlertThresholds::default());
        assert_eq!(config.report_schedule(), ReportSchedule::default());
        assert_eq!(config.dashboard.endpoint, THINGSPEAK_UPDATE_URL);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [thresholds]
            high = 27.5

            [storage]
            log_dir = "/var/lib/pitherm"
            "#,
        )
        .unwrap();

        assert_eq!(config.thresholds.high, 27.5);
        assert_eq!(config.thresholds.low, 19.0);
        assert_eq!(config.storage.log_dir, PathBuf::from("/var/lib/pitherm"));
        assert_eq!(config.sampling, SamplingConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [sampling]
            sample_interval_seconds = 10
            log_interval_seconds = 0

            [report]
            day_of_month = 2
            hour = 9

            [health]
            heartbeat_interval_seconds = 0
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let settings = config.monitor_settings();

        assert_eq!(settings.sample_interval, Duration::from_secs(10));
        assert_eq!(settings.log_interval, Duration::ZERO);
        assert_eq!(settings.heartbeat_interval, None);
        assert_eq!(
            config.report_schedule(),
            ReportSchedule {
                day_of_month: 2,
                hour: 9
            }
        );
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_malformed_toml_is_toml_error() {
        let result = Config::from_toml_str("[thresholds\nhigh = ");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));

        let result = Config::from_toml_str("[thresholds]\nhigh = \"hot\"");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_overlapping_thresholds_rejected() {
        let result = Config::from_toml_str(
            r#"
            [thresholds]
            high = 21.0
            low = 20.0
            hysteresis = 1.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        for content in [
            "[sampling]\nsample_interval_seconds = 0",
            "[report]\ncheck_interval_seconds = 0",
            "[report]\nday_of_month = 0",
            "[report]\nday_of_month = 31",
            "[report]\nhour = 24",
            "[storage]\nlog_dir = \"\"",
        ] {
            let result = Config::from_toml_str(content);
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "accepted: {content}"
            );
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config::from_toml_str(
            r#"
            [dashboard]
            api_key = "from-file"

            [report]
            webhook_url = "http://reports.local/in"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_THINGSPEAK_API_KEY, "from-env"),
            (ENV_NOTIFY_WEBHOOK, "http://alerts.local/hook"),
            (ENV_REPORT_WEBHOOK, "   "),
        ]
        .into_iter()
        .collect();
        config.apply_overrides_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.dashboard.api_key.as_deref(), Some("from-env"));
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("http://alerts.local/hook")
        );
        assert_eq!(
            config.report.webhook_url.as_deref(),
            Some("http://reports.local/in")
        );
    }
}
