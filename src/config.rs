use serde::{Deserialize, Deserializer};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Custom deserializer for comma-separated strings
fn deserialize_comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(s.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Application settings with environment variable support
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // Server
    pub server_port: u16,
    #[serde(deserialize_with = "deserialize_comma_separated")]
    pub cors_allow_origins: Vec<String>,

    // Logging
    pub log_level: String,
    pub log_format: String,

    // Scan pipeline tuning
    pub http_timeout_seconds: f64,
    pub banner_timeout_seconds: f64,
    pub fingerprint_concurrency: u32,
    pub tls_poll_attempts: u32,
    pub tls_poll_delay_seconds: f64,

    // Monitoring loop
    pub monitor_interval_seconds: f64,
    pub threat_history_capacity: u32,
    pub escalation_confidence_threshold: f64,

    // External collaborator base URLs (overridable so tests can redirect them)
    pub asset_db_url: String,
    pub tls_grader_url: String,
    pub cve_feed_url: String,
    pub alert_api_url: String,
    pub enrichment_api_url: String,

    // API credentials (all optional, injected from the environment)
    pub asset_db_api_key: Option<String>,
    pub enrichment_api_key: Option<String>,

    // Outbound client policy
    pub external_rate_limit_per_second: u32,
    pub external_max_retries: u32,
}

impl Settings {
    /// Create new settings instance from environment variables and .env file
    pub fn new() -> Result<Self, ConfigError> {
        Self::new_with_env_file(true)
    }

    /// Create new settings instance with optional .env file loading
    pub fn new_with_env_file(load_env_file: bool) -> Result<Self, ConfigError> {
        // Serialize settings construction to avoid cross-test environment races
        static SETTINGS_BUILD_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        let build_mutex = SETTINGS_BUILD_MUTEX.get_or_init(|| Mutex::new(()));
        let _guard = build_mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Load .env file if it exists and requested (skip during tests for determinism)
        #[cfg(not(test))]
        {
            if load_env_file {
                dotenvy::dotenv().ok();
            }
        }
        #[cfg(test)]
        let _ = load_env_file;

        let mut builder = config::Config::builder()
            // Server defaults
            .set_default("server_port", 8000u16)?
            .set_default(
                "cors_allow_origins",
                "http://localhost:3000,http://127.0.0.1:3000",
            )?
            // Logging defaults
            .set_default("log_level", "INFO")?
            .set_default("log_format", "json")?
            // Scan pipeline defaults
            .set_default("http_timeout_seconds", 5.0)?
            .set_default("banner_timeout_seconds", 2.0)?
            .set_default("fingerprint_concurrency", 8u32)?
            .set_default("tls_poll_attempts", 10u32)?
            .set_default("tls_poll_delay_seconds", 2.0)?
            // Monitoring defaults
            .set_default("monitor_interval_seconds", 10.0)?
            .set_default("threat_history_capacity", 10u32)?
            .set_default("escalation_confidence_threshold", 0.9)?
            // External service defaults
            .set_default("asset_db_url", "https://internetdb.shodan.io")?
            .set_default("tls_grader_url", "https://api.ssllabs.com/api/v3")?
            .set_default("cve_feed_url", "https://services.nvd.nist.gov/rest/json/cves/2.0")?
            .set_default("alert_api_url", "http://localhost:9400/api")?
            .set_default("enrichment_api_url", "http://localhost:9500/api")?
            // Credentials default to absent
            .set_default("asset_db_api_key", None::<String>)?
            .set_default("enrichment_api_key", None::<String>)?
            // Outbound client policy defaults
            .set_default("external_rate_limit_per_second", 5u32)?
            .set_default("external_max_retries", 2u32)?;

        // Apply environment overrides using explicit, uppercase-only mapping
        fn read_env(key: &str) -> Option<String> {
            std::env::var(key).ok()
        }

        // String overrides
        if let Some(v) = read_env("CORS_ALLOW_ORIGINS") {
            builder = builder.set_override("cors_allow_origins", v)?;
        }
        if let Some(v) = read_env("LOG_LEVEL") {
            builder = builder.set_override("log_level", v)?;
        }
        if let Some(v) = read_env("LOG_FORMAT") {
            builder = builder.set_override("log_format", v)?;
        }
        if let Some(v) = read_env("ASSET_DB_URL") {
            builder = builder.set_override("asset_db_url", v)?;
        }
        if let Some(v) = read_env("TLS_GRADER_URL") {
            builder = builder.set_override("tls_grader_url", v)?;
        }
        if let Some(v) = read_env("CVE_FEED_URL") {
            builder = builder.set_override("cve_feed_url", v)?;
        }
        if let Some(v) = read_env("ALERT_API_URL") {
            builder = builder.set_override("alert_api_url", v)?;
        }
        if let Some(v) = read_env("ENRICHMENT_API_URL") {
            builder = builder.set_override("enrichment_api_url", v)?;
        }
        if let Some(v) = read_env("ASSET_DB_API_KEY") {
            builder = builder.set_override("asset_db_api_key", v)?;
        }
        if let Some(v) = read_env("ENRICHMENT_API_KEY") {
            builder = builder.set_override("enrichment_api_key", v)?;
        }

        // Numeric overrides
        if let Some(v) = read_env("SERVER_PORT").and_then(|s| s.parse::<u16>().ok()) {
            builder = builder.set_override("server_port", v)?;
        }
        if let Some(v) = read_env("HTTP_TIMEOUT_SECONDS").and_then(|s| s.parse::<f64>().ok()) {
            builder = builder.set_override("http_timeout_seconds", v)?;
        }
        if let Some(v) = read_env("BANNER_TIMEOUT_SECONDS").and_then(|s| s.parse::<f64>().ok()) {
            builder = builder.set_override("banner_timeout_seconds", v)?;
        }
        if let Some(v) = read_env("FINGERPRINT_CONCURRENCY").and_then(|s| s.parse::<u32>().ok()) {
            builder = builder.set_override("fingerprint_concurrency", v)?;
        }
        if let Some(v) = read_env("TLS_POLL_ATTEMPTS").and_then(|s| s.parse::<u32>().ok()) {
            builder = builder.set_override("tls_poll_attempts", v)?;
        }
        if let Some(v) = read_env("TLS_POLL_DELAY_SECONDS").and_then(|s| s.parse::<f64>().ok()) {
            builder = builder.set_override("tls_poll_delay_seconds", v)?;
        }
        if let Some(v) = read_env("MONITOR_INTERVAL_SECONDS").and_then(|s| s.parse::<f64>().ok()) {
            builder = builder.set_override("monitor_interval_seconds", v)?;
        }
        if let Some(v) = read_env("THREAT_HISTORY_CAPACITY").and_then(|s| s.parse::<u32>().ok()) {
            builder = builder.set_override("threat_history_capacity", v)?;
        }
        if let Some(v) =
            read_env("ESCALATION_CONFIDENCE_THRESHOLD").and_then(|s| s.parse::<f64>().ok())
        {
            builder = builder.set_override("escalation_confidence_threshold", v)?;
        }
        if let Some(v) =
            read_env("EXTERNAL_RATE_LIMIT_PER_SECOND").and_then(|s| s.parse::<u32>().ok())
        {
            builder = builder.set_override("external_rate_limit_per_second", v)?;
        }
        if let Some(v) = read_env("EXTERNAL_MAX_RETRIES").and_then(|s| s.parse::<u32>().ok()) {
            builder = builder.set_override("external_max_retries", v)?;
        }

        let settings = builder.build()?;
        let config: Settings = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "plain") {
            return Err(ConfigError::Validation(
                "log_format must be 'json' or 'plain'".to_string(),
            ));
        }

        if self.http_timeout_seconds <= 0.0 {
            return Err(ConfigError::Validation(
                "http_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.banner_timeout_seconds <= 0.0 {
            return Err(ConfigError::Validation(
                "banner_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.fingerprint_concurrency == 0 {
            return Err(ConfigError::Validation(
                "fingerprint_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.tls_poll_attempts == 0 {
            return Err(ConfigError::Validation(
                "tls_poll_attempts must be greater than 0".to_string(),
            ));
        }

        if self.tls_poll_delay_seconds <= 0.0 {
            return Err(ConfigError::Validation(
                "tls_poll_delay_seconds must be greater than 0".to_string(),
            ));
        }

        if self.monitor_interval_seconds <= 0.0 {
            return Err(ConfigError::Validation(
                "monitor_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.threat_history_capacity == 0 {
            return Err(ConfigError::Validation(
                "threat_history_capacity must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.escalation_confidence_threshold) {
            return Err(ConfigError::Validation(
                "escalation_confidence_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.external_rate_limit_per_second == 0 {
            return Err(ConfigError::Validation(
                "external_rate_limit_per_second must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
