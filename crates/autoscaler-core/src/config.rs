//! Public API server configuration (`autoscaler.toml`).
//!
//! The file is parsed once at startup, validated, and then shared read-only
//! between request handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Static JSON document served by `GET /info`.
    pub info_file_path: String,
    /// When set, the API runs without a service broker and therefore
    /// without a binding store.
    pub use_buildin_mode: bool,
    pub logging: LoggingConfig,
    pub public_api_server: ServerConfig,
    pub db: DbConfig,
    pub scheduler: SchedulerConfig,
    pub scaling_engine: ScalingEngineConfig,
    pub event_generator: EventGeneratorConfig,
    pub metrics_forwarder: MetricsForwarderConfig,
    pub scaling_rules: ScalingRulesConfig,
    pub http_client: HttpClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Scheme and host that external callers use to reach this API.
    /// Pagination links are rebuilt on top of it.
    pub external_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            external_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DbConfig {
    /// redb file holding policies, service-instance bindings and credentials.
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub scheduler_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalingEngineConfig {
    pub scaling_engine_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventGeneratorConfig {
    pub event_generator_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsForwarderConfig {
    pub metrics_forwarder_url: String,
    pub metrics_forwarder_mtls_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScalingRulesConfig {
    pub cpu: ThresholdBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdBounds {
    pub lower_threshold: i64,
    pub upper_threshold: i64,
}

impl Default for ThresholdBounds {
    fn default() -> Self {
        Self {
            lower_threshold: 1,
            upper_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Bound applied to every downstream call, e.g. "10s", "500ms", "1m".
    pub timeout: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: "10s".to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check the rules a running server depends on. Reports the first
    /// violation only.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(value: &str, what: &str) -> Result<(), ConfigError> {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{what} is empty")));
            }
            Ok(())
        }

        require(&self.db.path, "db.path")?;
        require(&self.scheduler.scheduler_url, "scheduler.scheduler_url")?;
        require(
            &self.scaling_engine.scaling_engine_url,
            "scaling_engine.scaling_engine_url",
        )?;
        require(
            &self.event_generator.event_generator_url,
            "event_generator.event_generator_url",
        )?;
        require(
            &self.metrics_forwarder.metrics_forwarder_url,
            "metrics_forwarder.metrics_forwarder_url",
        )?;
        require(&self.info_file_path, "info_file_path")?;

        let cpu = &self.scaling_rules.cpu;
        if cpu.lower_threshold < 1 {
            return Err(ConfigError::Invalid(
                "scaling_rules.cpu.lower_threshold must be greater than or equal to 1".into(),
            ));
        }
        if cpu.upper_threshold > 100 {
            return Err(ConfigError::Invalid(
                "scaling_rules.cpu.upper_threshold must be less than or equal to 100".into(),
            ));
        }
        if cpu.lower_threshold > cpu.upper_threshold {
            return Err(ConfigError::Invalid(format!(
                "scaling_rules.cpu.lower_threshold {} is higher than upper_threshold {}",
                cpu.lower_threshold, cpu.upper_threshold
            )));
        }

        match parse_duration(&self.http_client.timeout) {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "http_client.timeout {:?} is not a positive duration",
                    self.http_client.timeout
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level {:?} is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Timeout for downstream calls. Falls back to 10s for an unparsable
    /// value; `validate` rejects those up front.
    pub fn http_timeout(&self) -> Duration {
        parse_duration(&self.http_client.timeout).unwrap_or(Duration::from_secs(10))
    }

    /// The binding store only exists when a service broker is deployed.
    pub fn binding_store_enabled(&self) -> bool {
        !self.use_buildin_mode
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
info_file_path = "/var/vcap/jobs/autoscaler/config/info-file.json"

[logging]
level = "debug"

[public_api_server]
port = 8081
external_url = "https://autoscaler.example.com"

[db]
path = "/var/lib/autoscaler/api.redb"

[scheduler]
scheduler_url = "https://localhost:8083"

[scaling_engine]
scaling_engine_url = "https://localhost:8084"

[event_generator]
event_generator_url = "https://localhost:8085"

[metrics_forwarder]
metrics_forwarder_url = "https://localhost:8088"
metrics_forwarder_mtls_url = "https://mtls.localhost:8084"

[scaling_rules.cpu]
lower_threshold = 1
upper_threshold = 200

[http_client]
timeout = "5s"
"#;

    fn valid_config() -> Config {
        let mut conf = Config::from_toml_str(VALID).unwrap();
        conf.scaling_rules.cpu.upper_threshold = 100;
        conf
    }

    #[test]
    fn parse_full_config() {
        let conf = Config::from_toml_str(VALID).unwrap();
        assert_eq!(conf.logging.level, "debug");
        assert_eq!(conf.logging.format, "text");
        assert_eq!(conf.public_api_server.port, 8081);
        assert_eq!(
            conf.public_api_server.external_url.as_deref(),
            Some("https://autoscaler.example.com")
        );
        assert_eq!(conf.scheduler.scheduler_url, "https://localhost:8083");
        assert_eq!(
            conf.metrics_forwarder.metrics_forwarder_mtls_url.as_deref(),
            Some("https://mtls.localhost:8084")
        );
        assert_eq!(conf.scaling_rules.cpu.upper_threshold, 200);
        assert_eq!(conf.http_timeout(), Duration::from_secs(5));
        assert!(conf.binding_store_enabled());
    }

    #[test]
    fn partial_config_gets_defaults() {
        let conf = Config::from_toml_str("[db]\npath = \"x.redb\"\n").unwrap();
        assert_eq!(conf.logging.level, "info");
        assert_eq!(conf.public_api_server.port, 8081);
        assert_eq!(conf.scaling_rules.cpu, ThresholdBounds::default());
        assert_eq!(conf.http_timeout(), Duration::from_secs(10));
        assert!(!conf.use_buildin_mode);
    }

    #[test]
    fn non_integer_port_is_a_parse_error() {
        let err = Config::from_toml_str("[public_api_server]\nport = \"port\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoscaler.toml");
        std::fs::write(&path, VALID).unwrap();
        let conf = Config::from_file(&path).unwrap();
        assert_eq!(conf.db.path, "/var/lib/autoscaler/api.redb");

        let missing = Config::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn valid_config_passes() {
        valid_config().validate().unwrap();
    }

    fn assert_invalid(conf: Config, needle: &str) {
        let err = conf.validate().unwrap_err().to_string();
        assert!(err.starts_with("Configuration error: "), "{err}");
        assert!(err.contains(needle), "{err} does not mention {needle}");
    }

    #[test]
    fn missing_urls_are_rejected() {
        let mut conf = valid_config();
        conf.scheduler.scheduler_url.clear();
        assert_invalid(conf, "scheduler.scheduler_url is empty");

        let mut conf = valid_config();
        conf.scaling_engine.scaling_engine_url.clear();
        assert_invalid(conf, "scaling_engine.scaling_engine_url is empty");

        let mut conf = valid_config();
        conf.event_generator.event_generator_url.clear();
        assert_invalid(conf, "event_generator.event_generator_url is empty");

        let mut conf = valid_config();
        conf.metrics_forwarder.metrics_forwarder_url.clear();
        assert_invalid(conf, "metrics_forwarder.metrics_forwarder_url is empty");
    }

    #[test]
    fn missing_paths_are_rejected() {
        let mut conf = valid_config();
        conf.db.path.clear();
        assert_invalid(conf, "db.path is empty");

        let mut conf = valid_config();
        conf.info_file_path.clear();
        assert_invalid(conf, "info_file_path is empty");
    }

    #[test]
    fn cpu_bounds_are_checked() {
        let conf = Config::from_toml_str(VALID).unwrap();
        assert_invalid(conf, "upper_threshold");

        let mut conf = valid_config();
        conf.scaling_rules.cpu.lower_threshold = 0;
        assert_invalid(conf, "lower_threshold");

        let mut conf = valid_config();
        conf.scaling_rules.cpu.lower_threshold = 80;
        conf.scaling_rules.cpu.upper_threshold = 20;
        assert_invalid(conf, "is higher than");
    }

    #[test]
    fn bad_timeout_and_level_are_rejected() {
        let mut conf = valid_config();
        conf.http_client.timeout = "soon".to_string();
        assert_invalid(conf, "http_client.timeout");

        let mut conf = valid_config();
        conf.http_client.timeout = "0s".to_string();
        assert_invalid(conf, "http_client.timeout");

        let mut conf = valid_config();
        conf.logging.level = "loud".to_string();
        assert_invalid(conf, "logging.level");
    }

    #[test]
    fn buildin_mode_disables_binding_store() {
        let mut conf = valid_config();
        conf.use_buildin_mode = true;
        assert!(!conf.binding_store_enabled());
        conf.validate().unwrap();
    }

    #[test]
    fn duration_strings() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("later"), None);
    }
}
