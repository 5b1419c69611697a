//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub instance: InstanceConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub tokens: TokenConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "social.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://social.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Instance metadata
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub title: String,
    pub description: String,
    pub contact_email: String,
}

/// Authentication configuration (session cookies)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
}

/// Admin configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Shared secret for the signup approval endpoints
    pub secret: String,
}

/// Magic link token lifetimes
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Signin link lifetime in minutes (default: 30)
    pub signin_ttl_minutes: i64,
    /// Signup invitation lifetime in minutes (default: 1440 = 24h)
    pub signup_ttl_minutes: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SKIFF__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/skiff.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("tokens.signin_ttl_minutes", 30)?
            .set_default("tokens.signup_ttl_minutes", 1440)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (SKIFF__*)
            .add_source(
                Environment::with_prefix("SKIFF")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.server.domain.is_empty() {
            return Err(crate::error::AppError::Config(
                "server.domain must not be empty".to_string(),
            ));
        }
        if !matches!(self.server.protocol.as_str(), "http" | "https") {
            return Err(crate::error::AppError::Config(format!(
                "server.protocol must be http or https, got {}",
                self.server.protocol
            )));
        }
        if self.auth.session_secret.len() < 32 {
            return Err(crate::error::AppError::Config(
                "auth.session_secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.admin.secret.is_empty() {
            return Err(crate::error::AppError::Config(
                "admin.secret must not be empty".to_string(),
            ));
        }
        if self.tokens.signin_ttl_minutes <= 0 || self.tokens.signup_ttl_minutes <= 0 {
            return Err(crate::error::AppError::Config(
                "token lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
