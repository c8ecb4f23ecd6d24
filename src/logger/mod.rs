//! Logger module
//!
//! Provides logging utilities for the webhook server including:
//! - Subscriber setup (stderr or append-only log file)
//! - Server lifecycle logging
//! - Update dispatch and Bot API call logging
//! - Access logging with multiple formats

mod format;

pub use format::AccessLogEntry;

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};
use crate::routing::{Dispatch, Matched};

/// Initialize the global subscriber with configuration
///
/// Should be called once at application startup. `RUST_LOG` takes precedence
/// over `logging.level`.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.log_file.as_deref() {
        Some(path) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> std::io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Webhook server started");
    tracing::info!("Listening on: http://{addr}{}", config.webhook.path);
    tracing::info!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if config.webhook.secret_token.is_some() {
        tracing::info!("Secret token check: enabled");
    }
    if let Some(ref username) = config.telegram.bot_username {
        tracing::info!("Bot username: @{}", username.trim_start_matches('@'));
    }
    if let Some(ref path) = config.logging.log_file {
        tracing::info!("Log file: {path}");
    }
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_update_received(update_id: Option<i64>, kind: Option<&str>) {
    tracing::debug!(
        update_id = update_id.unwrap_or_default(),
        kind = kind.unwrap_or("-"),
        "Update received"
    );
}

pub fn log_update_dispatched(update_id: Option<i64>, dispatch: &Dispatch) {
    let update_id = update_id.unwrap_or_default();
    match &dispatch.matched {
        Matched::Command(command) => {
            tracing::info!(update_id, events = dispatch.events, "Command {command} handled");
        }
        Matched::Text(pattern) => {
            tracing::info!(update_id, events = dispatch.events, "Text {pattern:?} handled");
        }
        Matched::Unhandled => {
            tracing::debug!(update_id, events = dispatch.events, "No command or text handler matched");
        }
    }
}

pub fn log_handler_failed(update_id: Option<i64>, err: &dyn Error) {
    tracing::error!(update_id = update_id.unwrap_or_default(), "Handler failed: {err}");
}

pub fn log_api_call(method: &str, status: u16, elapsed: Duration) {
    tracing::debug!(
        method,
        status,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "Bot API call"
    );
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_shutdown(active_connections: usize) {
    tracing::info!("Shutdown requested, {active_connections} connection(s) still open");
}
