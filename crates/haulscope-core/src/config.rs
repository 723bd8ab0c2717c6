//! Configuration management for Haulscope
//!
//! Settings are layered: built-in defaults, then an optional config file, then
//! `HAULSCOPE__SECTION__KEY` environment variables, then the flat variable names
//! older deployments still export (`DB_DSN`, `JWT_ACCESS_SECRET`, ...).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment prefix for nested overrides
pub const ENV_PREFIX: &str = "HAULSCOPE";

/// Flat variables mapped onto config keys
const LEGACY_ENV: &[(&str, &str)] = &[
    ("DB_DSN", "database.url"),
    ("JWT_ACCESS_SECRET", "auth.jwt_secret"),
    ("HTTP_HOST", "server.host"),
    ("HTTP_PORT", "server.port"),
    ("ANALYTICS_DEFAULT_RANGE_DAYS", "analytics.default_range_days"),
    ("ANALYTICS_MAX_RANGE_DAYS", "analytics.max_range_days"),
];

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token verification
    pub auth: AuthConfig,

    /// Report defaults and bounds
    pub analytics: AnalyticsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Prometheus exporter
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`Config::load`] with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in LEGACY_ENV {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that have no usable default
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(Error::config("database.url (DB_DSN) is required"));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::config("auth.jwt_secret (JWT_ACCESS_SECRET) is required"));
        }
        if self.analytics.default_range_days == 0 || self.analytics.max_range_days == 0 {
            return Err(Error::config("analytics range days must be at least 1"));
        }
        if self.analytics.top_limit == 0 || self.analytics.performance_limit == 0 {
            return Err(Error::config("analytics limits must be at least 1"));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
    /// Deadline for a single request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7085,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Maximum connections
    pub max_connections: u32,
    /// Minimum connections
    pub min_connections: u32,
    /// How long to wait for a pooled connection
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 20,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Bearer token verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub jwt_secret: String,
    /// Clock skew tolerated on `exp`, in seconds
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            leeway_secs: 30,
        }
    }
}

/// Report defaults and bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Range width used when `from` is omitted
    pub default_range_days: u32,
    /// Widest range a caller may request
    pub max_range_days: u32,
    /// Size of "top N" leader boards
    pub top_limit: u32,
    /// Rows per performance table
    pub performance_limit: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_range_days: 7,
            max_range_days: 90,
            top_limit: 5,
            performance_limit: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Start the scrape listener
    pub enabled: bool,
    /// Scrape listener address
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9185".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PREFIX: &str = "HAULSCOPE_CONFIG_TEST";

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_fail_validation_without_secrets() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_config(
            r#"
            [server]
            port = 9000
            request_timeout = "45s"

            [database]
            url = "postgres://analytics@localhost/city"

            [auth]
            jwt_secret = "s3cret"

            [analytics]
            max_range_days = 30
            "#,
        );

        let config = Config::load_with_prefix(Some(file.path()), PREFIX).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.request_timeout, Duration::from_secs(45));
        assert_eq!(config.analytics.max_range_days, 30);
        assert_eq!(config.analytics.default_range_days, 7);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_range_is_rejected() {
        let file = write_config(
            r#"
            [database]
            url = "postgres://analytics@localhost/city"
            [auth]
            jwt_secret = "s3cret"
            [analytics]
            default_range_days = 0
            "#,
        );

        let err = Config::load_with_prefix(Some(file.path()), PREFIX).unwrap_err();
        assert!(err.to_string().contains("range days"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::load_with_prefix(Some(Path::new("/nonexistent/haulscope.toml")), PREFIX);
        assert!(result.is_err());
    }

    #[test]
    fn test_bind_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_addr(), "0.0.0.0:7085");
    }
}
