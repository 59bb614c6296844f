//! Runtime configuration.
//!
//! Values come from a TOML file when one exists; every field falls back to
//! an environment variable and then to a hardcoded default, so the adapter
//! can run from environment alone. The loaded [`Config`] is immutable and
//! shared by reference across all components.

use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application name used for event filtering and registry entries.
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub amqp: AmqpConfig,
    #[serde(default)]
    pub consul: ConsulConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Address the adapter's own status endpoint binds to and advertises.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Control API endpoint and basic-auth credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_username")]
    pub username: String,
    #[serde(default = "default_api_password")]
    pub password: String,
}

/// Broker connection parameters and topic exchange name.
#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    #[serde(default = "default_amqp_host")]
    pub host: String,
    #[serde(default = "default_amqp_port")]
    pub port: u16,
    #[serde(default = "default_amqp_username")]
    pub username: String,
    #[serde(default = "default_amqp_password")]
    pub password: String,
    #[serde(default = "default_amqp_exchange")]
    pub exchange: String,
}

/// Service registry address.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsulConfig {
    #[serde(default = "default_consul_host")]
    pub host: String,
    #[serde(default = "default_consul_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_or_port(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

fn default_app_name() -> String {
    env_or("APP_NAME", "ari-bridge")
}

fn default_host() -> String {
    env_or("APP_HOST", "127.0.0.1")
}

fn default_http_port() -> u16 {
    env_or_port("APP_PORT", 8000)
}

fn default_api_endpoint() -> String {
    env_or("API_ENDPOINT", "http://localhost:8088")
}

fn default_api_username() -> String {
    env_or("API_USERNAME", "ari")
}

fn default_api_password() -> String {
    env_or("API_PASSWORD", "ari")
}

fn default_amqp_host() -> String {
    env_or("AMQP_HOST", "127.0.0.1")
}

fn default_amqp_port() -> u16 {
    env_or_port("AMQP_PORT", 5672)
}

fn default_amqp_username() -> String {
    env_or("AMQP_USERNAME", "guest")
}

fn default_amqp_password() -> String {
    env_or("AMQP_PASSWORD", "guest")
}

fn default_amqp_exchange() -> String {
    env_or("AMQP_EXCHANGE", "ari")
}

fn default_consul_host() -> String {
    env_or("CONSUL_HOST", "127.0.0.1")
}

fn default_consul_port() -> u16 {
    env_or_port("CONSUL_PORT", 8500)
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_api_endpoint(),
            username: default_api_username(),
            password: default_api_password(),
        }
    }
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            host: default_amqp_host(),
            port: default_amqp_port(),
            username: default_amqp_username(),
            password: default_amqp_password(),
            exchange: default_amqp_exchange(),
        }
    }
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            host: default_consul_host(),
            port: default_consul_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            http: HttpConfig::default(),
            api: ApiConfig::default(),
            amqp: AmqpConfig::default(),
            consul: ConsulConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: every field has an environment or
    /// hardcoded fallback.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = if path.as_ref().is_file() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
        } else {
            Self::default()
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("application name cannot be empty".into()));
        }
        if self.amqp.exchange.is_empty() {
            return Err(Error::Config("amqp exchange cannot be empty".into()));
        }
        Url::parse(&self.api.endpoint)?;
        Ok(())
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}
