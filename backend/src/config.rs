//! Configuration management for the inventory administration backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with INV_ prefix

use std::net::{AddrParseError, IpAddr, SocketAddr};

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// WhatsApp gateway defaults
    pub whatsapp: WhatsAppConfig,

    /// SMTP defaults
    pub smtp: SmtpConfig,

    /// Low stock scheduler configuration
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens
    pub secret: String,
}

/// Process-level WhatsApp gateway settings, overridable per site
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WhatsAppConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub sender: String,
}

/// Process-level SMTP settings, overridable per site
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Start the background low stock scheduler
    pub enabled: bool,

    /// Seconds between scheduler ticks
    pub tick_interval_secs: u64,

    /// Seconds to wait for a running tick during shutdown
    pub shutdown_timeout_secs: u64,

    /// Seconds a loaded site settings row stays cached
    pub site_settings_ttl_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("INV_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("whatsapp.api_url", "https://wa.drpnet.my.id/send-message")?
            .set_default("smtp.host", "smtp.gmail.com")?
            .set_default("smtp.port", 587)?
            .set_default("smtp.from_name", "TatApps")?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.tick_interval_secs", 60)?
            .set_default("scheduler.shutdown_timeout_secs", 10)?
            .set_default("scheduler.site_settings_ttl_secs", 60)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (INV prefix)
            .add_source(
                Environment::with_prefix("INV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl ServerConfig {
    /// Address the HTTP listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.host.trim().parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: 60,
            shutdown_timeout_secs: 10,
            site_settings_ttl_secs: 60,
        }
    }
}
