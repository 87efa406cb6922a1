//! finrecon-config - configuration loading

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    // dev: 10, production: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// JWT configuration. The same secret keys bearer tokens and magic-link
/// digests.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_expires_in() -> i64 {
    28800
}

fn default_issuer() -> String {
    "finrecon360".to_string()
}

fn default_audience() -> String {
    "finrecon360".to_string()
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Magic-link token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkConfig {
    #[serde(default = "default_token_expires_minutes")]
    pub expires_minutes: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default)]
    pub resend_cooldown_seconds: i64,
    #[serde(default)]
    pub frontend_base_url: String,
}

fn default_token_expires_minutes() -> i64 {
    10
}

fn default_max_attempts() -> i32 {
    5
}

impl Default for MagicLinkConfig {
    fn default() -> Self {
        Self {
            expires_minutes: default_token_expires_minutes(),
            max_attempts: default_max_attempts(),
            resend_cooldown_seconds: 0,
            frontend_base_url: String::new(),
        }
    }
}

/// Transactional email (Brevo) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_empty_secret")]
    pub api_key: Secret<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default)]
    pub sender_email: String,
    /// Brevo template ids; 0 means unconfigured
    #[serde(default)]
    pub template_id_verify: i64,
    #[serde(default)]
    pub template_id_reset: i64,
    /// Falls back to `template_id_reset` when 0
    #[serde(default)]
    pub template_id_change: i64,
}

fn default_empty_secret() -> Secret<String> {
    Secret::new(String::new())
}

fn default_api_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

fn default_sender_name() -> String {
    "FinRecon360".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: default_empty_secret(),
            api_url: default_api_url(),
            sender_name: default_sender_name(),
            sender_email: String::new(),
            template_id_verify: 0,
            template_id_reset: 0,
            template_id_change: 0,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub magic_link: MagicLinkConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from TOML files and environment variables
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("").split("_"))
            .extract()?;

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

#[cfg(test)]
mod tests;
