// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::net::SocketAddr;

use crate::webhook::HEALTH_PATH;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig, TelegramConfig,
    WebhookConfig,
};

/// Access log formats understood by the logger
pub const ACCESS_LOG_FORMATS: [&str; 3] = ["combined", "common", "json"];

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = defaults()?
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("BOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML document layered over the defaults
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram.token is required (set it in the config file or BOT__TELEGRAM__TOKEN)"
                    .to_string(),
            ));
        }
        if !self.webhook.path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "webhook.path must start with '/': {}",
                self.webhook.path
            )));
        }
        if self.webhook.path == HEALTH_PATH {
            return Err(ConfigError::Message(format!(
                "webhook.path must not be the health check path {HEALTH_PATH}"
            )));
        }
        if self.performance.read_timeout == 0 || self.performance.write_timeout == 0 {
            return Err(ConfigError::Message(
                "performance.read_timeout and performance.write_timeout must be at least 1 second"
                    .to_string(),
            ));
        }
        if !ACCESS_LOG_FORMATS.contains(&self.logging.access_log_format.as_str()) {
            return Err(ConfigError::Message(format!(
                "unknown logging.access_log_format '{}' (expected one of {})",
                self.logging.access_log_format,
                ACCESS_LOG_FORMATS.join(", ")
            )));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Full webhook URL to register with Telegram, if a public URL is configured
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook
            .public_url
            .as_deref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), self.webhook.path))
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("webhook.path", "/webhook")?
        .set_default("telegram.token", "")?
        .set_default("telegram.api_url", "https://api.telegram.org")?
        .set_default("telegram.request_timeout", 10)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 30)?
        .set_default("performance.write_timeout", 30)?
        .set_default("http.server_name", "telegram-webhook")?
        .set_default("http.max_body_size", 1_048_576) // 1MB
}
