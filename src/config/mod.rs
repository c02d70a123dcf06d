//! Configuration management for congress-sync
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Upstream API configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Admission control for upstream requests
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry configuration for upstream requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Sync orchestration configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix CONGRESS_SYNC_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(base_url) = std::env::var("CONGRESS_SYNC_BASE_URL") {
            config.upstream.base_url = base_url;
        }
        if let Ok(api_key) = std::env::var("CONGRESS_SYNC_API_KEY") {
            config.upstream.api_key = Some(api_key);
        }
        if let Ok(rph) = std::env::var("CONGRESS_SYNC_REQUESTS_PER_HOUR") {
            config.rate_limit.requests_per_hour = parse_env("CONGRESS_SYNC_REQUESTS_PER_HOUR", &rph)?;
        }
        if let Ok(burst) = std::env::var("CONGRESS_SYNC_BURST_CAPACITY") {
            config.rate_limit.burst_capacity = parse_env("CONGRESS_SYNC_BURST_CAPACITY", &burst)?;
        }
        if let Ok(batch) = std::env::var("CONGRESS_SYNC_BATCH_SIZE") {
            config.sync.batch_size = parse_env("CONGRESS_SYNC_BATCH_SIZE", &batch)?;
        }
        if let Ok(interval) = std::env::var("CONGRESS_SYNC_INTERVAL_SECS") {
            config.sync.interval_secs = parse_env("CONGRESS_SYNC_INTERVAL_SECS", &interval)?;
        }
        if let Ok(path) = std::env::var("CONGRESS_SYNC_DATABASE_PATH") {
            config.database.path = path;
        }
        if let Ok(level) = std::env::var("CONGRESS_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(enabled) = std::env::var("CONGRESS_SYNC_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("CONGRESS_SYNC_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        Ok(config)
    }

    /// Check values that serde defaults cannot guard
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("upstream.base_url".to_string()));
        }
        if self.upstream.page_size == 0 || self.upstream.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue(format!(
                "upstream.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.rate_limit.requests_per_hour == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.requests_per_hour must be positive".to_string(),
            ));
        }
        if self.rate_limit.burst_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.burst_capacity must be positive".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "retry.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.sync.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "sync.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid value for {}: {}", name, value)))
}

/// Largest page the congress.gov API serves
pub const MAX_PAGE_SIZE: u32 = 250;

/// Upstream (congress.gov) API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// API base URL, including the version segment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as `X-Api-Key`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.congress.gov/v3".to_string()
}

fn default_page_size() -> u32 {
    250
}

fn default_request_timeout() -> u64 {
    30
}

/// Token bucket configuration for upstream requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Hourly request quota granted by the upstream API
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,

    /// Maximum tokens that can accumulate (burst allowance)
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,

    /// Longest a request waits for a token (in milliseconds)
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,

    /// Wait time when rate limited without a Retry-After header (in seconds)
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_hour: default_requests_per_hour(),
            burst_capacity: default_burst_capacity(),
            acquire_timeout_ms: default_acquire_timeout(),
            rate_limit_wait_secs: default_rate_limit_wait(),
        }
    }
}

fn default_requests_per_hour() -> u32 {
    5000
}

fn default_burst_capacity() -> u32 {
    100
}

fn default_acquire_timeout() -> u64 {
    60_000
}

fn default_rate_limit_wait() -> u64 {
    60
}

/// Retry configuration for external API calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to draw the delay uniformly from `[0, backoff]`
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

/// Sync orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Interval between scheduled runs in seconds
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Delay before the first scheduled run in seconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Upper bound of random delay added to each scheduled run in seconds
    #[serde(default)]
    pub jitter_secs: u64,

    /// Records written per flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Congresses to sync (empty = current congress)
    #[serde(default)]
    pub congresses: Vec<u32>,

    /// Failures tolerated at one offset before that stream stops
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Page fetch failures tolerated in one run before it aborts
    #[serde(default = "default_max_total_errors")]
    pub max_total_errors: u32,

    /// Pause before re-requesting a failed offset in milliseconds
    #[serde(default = "default_page_retry_delay")]
    pub page_retry_delay_ms: u64,

    /// Only request records updated since the last successful run
    #[serde(default = "default_incremental")]
    pub incremental: bool,

    /// Fetch bill detail and committee listings for each bill
    #[serde(default = "default_fetch_bill_details")]
    pub fetch_bill_details: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            initial_delay_secs: default_initial_delay(),
            jitter_secs: 0,
            batch_size: default_batch_size(),
            congresses: Vec::new(),
            max_consecutive_errors: default_max_consecutive_errors(),
            max_total_errors: default_max_total_errors(),
            page_retry_delay_ms: default_page_retry_delay(),
            incremental: default_incremental(),
            fetch_bill_details: default_fetch_bill_details(),
        }
    }
}

fn default_sync_interval() -> u64 {
    21_600 // 6 hours
}

fn default_initial_delay() -> u64 {
    5
}

fn default_batch_size() -> usize {
    50
}

fn default_max_consecutive_errors() -> u32 {
    3
}

fn default_max_total_errors() -> u32 {
    100
}

fn default_page_retry_delay() -> u64 {
    1000
}

fn default_incremental() -> bool {
    true
}

fn default_fetch_bill_details() -> bool {
    true
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/congress-sync.db".to_string()
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "congress-sync".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
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

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: Parse complete configuration from YAML
    #[test]
    fn test_parse_complete_yaml_config() {
        let yaml = r#"
upstream:
  base_url: "http://localhost:9000/v3"
  api_key: "secret-key"
  page_size: 100
  request_timeout_secs: 10

rate_limit:
  requests_per_hour: 1000
  burst_capacity: 20
  acquire_timeout_ms: 5000
  rate_limit_wait_secs: 30

retry:
  max_retries: 5
  base_delay_ms: 250
  max_delay_ms: 8000
  backoff_multiplier: 3.0
  jitter: false

sync:
  interval_secs: 3600
  initial_delay_secs: 0
  jitter_secs: 30
  batch_size: 25
  congresses: [117, 118]
  max_consecutive_errors: 5
  max_total_errors: 50
  page_retry_delay_ms: 0
  incremental: false
  fetch_bill_details: false

database:
  path: "/tmp/test.db"

otel:
  enabled: true
  endpoint: "http://localhost:4317"
  service_name: "test-service"

logging:
  level: "debug"
  format: "pretty"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.upstream.base_url, "http://localhost:9000/v3");
        assert_eq!(config.upstream.api_key, Some("secret-key".to_string()));
        assert_eq!(config.upstream.page_size, 100);
        assert_eq!(config.upstream.request_timeout_secs, 10);

        assert_eq!(config.rate_limit.requests_per_hour, 1000);
        assert_eq!(config.rate_limit.burst_capacity, 20);
        assert_eq!(config.rate_limit.acquire_timeout_ms, 5000);
        assert_eq!(config.rate_limit.rate_limit_wait_secs, 30);

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 250);
        assert_eq!(config.retry.max_delay_ms, 8000);
        assert!((config.retry.backoff_multiplier - 3.0).abs() < f64::EPSILON);
        assert!(!config.retry.jitter);

        assert_eq!(config.sync.interval_secs, 3600);
        assert_eq!(config.sync.jitter_secs, 30);
        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.sync.congresses, vec![117, 118]);
        assert_eq!(config.sync.max_consecutive_errors, 5);
        assert_eq!(config.sync.max_total_errors, 50);
        assert!(!config.sync.incremental);
        assert!(!config.sync.fetch_bill_details);

        assert_eq!(config.database.path, "/tmp/test.db");

        assert!(config.otel.enabled);
        assert_eq!(
            config.otel.endpoint,
            Some("http://localhost:4317".to_string())
        );

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    // Test 2: Default values are applied for missing fields
    #[test]
    fn test_default_values_applied() {
        let yaml = r#"
upstream:
  api_key: "abc"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.upstream.base_url, "https://api.congress.gov/v3");
        assert_eq!(config.upstream.page_size, 250);

        assert_eq!(config.rate_limit.requests_per_hour, 5000);
        assert_eq!(config.rate_limit.burst_capacity, 100);
        assert_eq!(config.rate_limit.acquire_timeout_ms, 60_000);

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert!(config.retry.jitter);

        assert_eq!(config.sync.batch_size, 50);
        assert!(config.sync.congresses.is_empty());
        assert_eq!(config.sync.max_consecutive_errors, 3);
        assert_eq!(config.sync.max_total_errors, 100);
        assert!(config.sync.incremental);
        assert!(config.sync.fetch_bill_details);

        assert_eq!(config.database.path, "/data/db/congress-sync.db");
        assert!(!config.otel.enabled);
        assert_eq!(config.otel.service_name, "congress-sync");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }

    // Test 3: Environment variable expansion
    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TEST_CONGRESS_API_KEY", "env_secret");

        let yaml = r#"
upstream:
  api_key: "${TEST_CONGRESS_API_KEY}"
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.upstream.api_key, Some("env_secret".to_string()));

        std::env::remove_var("TEST_CONGRESS_API_KEY");
    }

    // Test 4: from_env loads config from environment variables
    #[test]
    fn test_from_env() {
        std::env::set_var("CONGRESS_SYNC_BASE_URL", "http://mock/v3");
        std::env::set_var("CONGRESS_SYNC_API_KEY", "key123");
        std::env::set_var("CONGRESS_SYNC_REQUESTS_PER_HOUR", "1200");
        std::env::set_var("CONGRESS_SYNC_BATCH_SIZE", "10");
        std::env::set_var("CONGRESS_SYNC_DATABASE_PATH", "/env/test.db");

        let config = Config::from_env().unwrap();

        assert_eq!(config.upstream.base_url, "http://mock/v3");
        assert_eq!(config.upstream.api_key, Some("key123".to_string()));
        assert_eq!(config.rate_limit.requests_per_hour, 1200);
        assert_eq!(config.sync.batch_size, 10);
        assert_eq!(config.database.path, "/env/test.db");

        std::env::remove_var("CONGRESS_SYNC_BASE_URL");
        std::env::remove_var("CONGRESS_SYNC_API_KEY");
        std::env::remove_var("CONGRESS_SYNC_REQUESTS_PER_HOUR");
        std::env::remove_var("CONGRESS_SYNC_BATCH_SIZE");
        std::env::remove_var("CONGRESS_SYNC_DATABASE_PATH");
    }

    // Test 5: Parse error for invalid YAML
    #[test]
    fn test_parse_error_invalid_yaml() {
        let yaml = r#"
rate_limit:
  requests_per_hour: "lots"
"#;

        match Config::from_yaml(yaml) {
            Err(ConfigError::Parse(msg)) => {
                assert!(msg.contains("Failed to parse YAML"));
            }
            other => panic!("Expected ConfigError::Parse, got {:?}", other),
        }
    }

    // Test 6: Validation rejects unusable values
    #[test]
    fn test_validate_rejects_invalid_values() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.rate_limit.requests_per_hour = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut config = Config::default();
        config.upstream.page_size = 500;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut config = Config::default();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upstream.base_url = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    // Test 7: Config serialization round-trip
    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config, parsed);
    }

    // Test 8: Empty YAML results in defaults
    #[test]
    fn test_empty_yaml_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    // Test 9: Loading from a file on disk
    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sync:\n  batch_size: 7").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sync.batch_size, 7);

        let missing = Config::from_file("/nonexistent/congress-sync.yaml");
        assert!(matches!(missing, Err(ConfigError::FileRead(_))));
    }
}
