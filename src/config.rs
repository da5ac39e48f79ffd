use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::escalation::AutoEscalationPolicy;
use crate::sla::DEFAULT_WARNING_THRESHOLD_PERCENT;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Escalation rule source
    #[serde(default)]
    pub rules: RulesConfig,

    /// Automatic escalation
    #[serde(default)]
    pub escalation: EscalationConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: FM_SLA__)
            .add_source(
                config::Environment::with_prefix("FM_SLA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults only, without file or environment overrides
    pub fn embedded_defaults() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Rule file (JSON, YAML or TOML). Unset or empty starts with no rules.
    #[serde(default)]
    pub source_path: Option<PathBuf>,
}

impl RulesConfig {
    pub fn source_path(&self) -> Option<&PathBuf> {
        self.source_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Run the periodic escalation monitor
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between evaluation cycles
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Share of the SLA window after which status turns to Warning
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold_percent: u32,

    #[serde(default)]
    pub thresholds: AutoEscalationPolicy,
}

impl EscalationConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: default_check_interval(),
            warning_threshold_percent: default_warning_threshold(),
            thresholds: AutoEscalationPolicy::default(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "facility-sla-engine".to_string()
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> u64 {
    60
}

fn default_warning_threshold() -> u32 {
    DEFAULT_WARNING_THRESHOLD_PERCENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_check_interval(), 60);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::embedded_defaults().unwrap();

        assert_eq!(config.server.http_port, 8080);
        assert!(config.escalation.enabled);
        assert_eq!(config.escalation.check_interval(), Duration::from_secs(60));
        assert_eq!(config.escalation.thresholds, AutoEscalationPolicy::default());
        assert_eq!(config.escalation.warning_threshold_percent, 75);
        assert!(config.rules.source_path().is_some());
    }

    #[test]
    fn test_empty_rule_path_means_no_source() {
        let rules = RulesConfig {
            source_path: Some(PathBuf::new()),
        };
        assert!(rules.source_path().is_none());
    }
}
