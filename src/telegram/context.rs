//! Per-update handler context

use serde_json::Value;
use std::sync::Arc;

use super::api::ApiClient;
use super::error::ApiError;
use super::update::Update;

/// Handed to every handler; cheap to clone.
#[derive(Debug, Clone)]
pub struct Context {
    api: Arc<ApiClient>,
    update: Arc<Update>,
}

impl Context {
    pub fn new(api: Arc<ApiClient>, update: Update) -> Self {
        Self {
            api,
            update: Arc::new(update),
        }
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.update.chat_id()
    }

    /// Send `text` to the chat this update came from.
    ///
    /// Returns `Ok(None)` without calling the API when the update has no chat.
    pub async fn reply(&self, text: &str, options: Value) -> Result<Option<Value>, ApiError> {
        let Some(chat_id) = self.chat_id() else {
            return Ok(None);
        };
        self.api
            .send_message(chat_id, text, options)
            .await
            .map(Some)
    }

    /// Forward any Bot API method.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        self.api.call(method, params).await
    }
}
