// Application state module
// Shared by every connection: configuration, router and Bot API client

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::Notify;

use super::types::Config;
use crate::routing::Router;
use crate::telegram::{ApiClient, ApiError};

/// Application state
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub router: Router,
    pub api: Arc<ApiClient>,
    pub active_connections: AtomicUsize,
    pub shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(config: Config, router: Router) -> Result<Self, ApiError> {
        let api = Arc::new(ApiClient::from_config(&config.telegram)?);
        Ok(Self::with_api(config, router, api))
    }

    pub fn with_api(config: Config, router: Router, api: Arc<ApiClient>) -> Self {
        Self {
            config,
            router,
            api,
            active_connections: AtomicUsize::new(0),
            shutdown: Arc::new(Notify::new()),
        }
    }
}
