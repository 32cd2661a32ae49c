//! Configuration types for the Sitepulse core library

use crate::Result;
use serde::{Deserialize, Serialize};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitepulseConfig {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: String,
    /// Hosted backend connection
    pub backend: BackendConfig,
    /// Session identity settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Tracker settings
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SitepulseConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backend: BackendConfig::default(),
            session: SessionConfig::default(),
            tracker: TrackerConfig::default(),
            dashboard: DashboardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Hosted backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL
    pub url: Url,
    /// Anonymous API key
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:54321").unwrap(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Session identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity window in minutes before a new session id is minted
    #[serde(default = "default_session_window")]
    pub window_minutes: u64,
    /// Directory for the persistent key-value store; in-memory when unset
    #[serde(default)]
    pub state_dir: Option<std::path::PathBuf>,
}

impl SessionConfig {
    /// Inactivity window as a duration
    pub fn window(&self) -> Result<chrono::Duration> {
        i64::try_from(self.window_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .ok_or_else(|| {
                crate::SitepulseError::validation(format!(
                    "session window out of bounds: {} minutes",
                    self.window_minutes
                ))
            })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_session_window(),
            state_dir: None,
        }
    }
}

/// Tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Buffer size of the navigation event channel
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: default_channel_buffer(),
        }
    }
}

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bind address for the dashboard server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Default date range in days
    #[serde(default = "default_range_days")]
    pub default_range_days: i64,
    /// Active-user refresh interval in seconds
    #[serde(default = "default_active_refresh")]
    pub active_refresh_secs: u64,
    /// Path a non-admin is redirected to
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_range_days: default_range_days(),
            active_refresh_secs: default_active_refresh(),
            sign_in_path: default_sign_in_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format: json, pretty, compact
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SitepulseConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        // Try YAML first, then JSON
        match serde_yaml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(_) => {
                let config = serde_json::from_str(&content)?;
                Ok(config)
            }
        }
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.scheme() != "http" && self.backend.url.scheme() != "https" {
            return Err(crate::SitepulseError::validation(
                "Backend URL must use http or https scheme",
            ));
        }

        if self.session.window_minutes == 0 {
            return Err(crate::SitepulseError::validation(
                "Session window must be at least one minute",
            ));
        }

        if self.dashboard.default_range_days <= 0 {
            return Err(crate::SitepulseError::validation(
                "Dashboard range must be a positive number of days",
            ));
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            other => {
                return Err(crate::SitepulseError::validation(format!(
                    "Unknown log format: {}",
                    other
                )));
            }
        }

        Ok(())
    }

    /// REST client settings derived from the backend section
    pub fn rest_config(&self) -> crate::store::RestStoreConfig {
        crate::store::RestStoreConfig {
            base_url: self.backend.url.as_str().trim_end_matches('/').to_string(),
            api_key: self.backend.api_key.clone(),
            timeout: std::time::Duration::from_secs(self.backend.timeout_secs),
        }
    }
}

// Default value functions
fn default_version() -> String {
    "1.0".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_session_window() -> u64 {
    30
}
fn default_channel_buffer() -> usize {
    64
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_range_days() -> i64 {
    30
}
fn default_active_refresh() -> u64 {
    30
}
fn default_sign_in_path() -> String {
    "/signin".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SitepulseConfig::default();
        config.validate().unwrap();
        assert_eq!(config.session.window_minutes, 30);
        assert_eq!(config.dashboard.default_range_days, 30);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = SitepulseConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: SitepulseConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(deserialized.backend.url, config.backend.url);
        assert_eq!(deserialized.logging.format, "json");
    }

    #[test]
    fn test_file_roundtrip() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let config = SitepulseConfig::default();
        config.to_file(temp_file.path()).unwrap();

        let loaded = SitepulseConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.version, config.version);
    }

    #[test]
    fn test_json_config_accepted() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            r#"{"backend": {"url": "https://backend.example"}}"#,
        )
        .unwrap();

        let loaded = SitepulseConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.backend.url.as_str(), "https://backend.example/");
        loaded.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SitepulseConfig::default();
        config.session.window_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = SitepulseConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = SitepulseConfig::default();
        config.dashboard.default_range_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_window_conversion() {
        let session = SessionConfig {
            window_minutes: 45,
            state_dir: None,
        };
        assert_eq!(session.window().unwrap(), chrono::Duration::minutes(45));

        let session = SessionConfig {
            window_minutes: u64::MAX,
            state_dir: None,
        };
        assert!(session.window().is_err());
    }
}
