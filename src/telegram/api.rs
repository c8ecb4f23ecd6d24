//! Bot API client
//!
//! Every Bot API method is an HTTPS POST of a JSON object to
//! `{api_url}/bot{token}/{method}`. [`ApiClient::call`] forwards any method
//! name verbatim; the typed helpers below are thin wrappers over it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::{Duration, Instant};

use super::error::ApiError;
use super::update::User;
use crate::config::TelegramConfig;
use crate::logger;

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(token: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.token,
            &config.api_url,
            Duration::from_secs(config.request_timeout),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    /// Call any Bot API method and return the decoded response as-is,
    /// including `{"ok": false, ...}` bodies.
    ///
    /// `params` must be a JSON object or `null`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        validate_method(method)?;
        let params = into_params(method, params)?;

        let started = Instant::now();
        let response = self
            .http
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(|e| ApiError::transport(method, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(method, e))?;
        logger::log_api_call(method, status.as_u16(), started.elapsed());

        serde_json::from_slice(&body).map_err(|e| ApiError::decode(method, e))
    }

    /// Call a method and decode its `result`, turning `ok: false` into
    /// [`ApiError::Telegram`].
    pub async fn call_result<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ApiError> {
        let value = self.call(method, params).await?;
        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| ApiError::decode(method, e))?;
        if !envelope.ok {
            return Err(ApiError::Telegram {
                method: method.to_string(),
                code: envelope.error_code.unwrap_or_default(),
                description: envelope.description.unwrap_or_default(),
            });
        }
        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| ApiError::decode(method, e))
    }

    /// `sendMessage`; keys in `options` override `chat_id` and `text`.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: Value,
    ) -> Result<Value, ApiError> {
        let mut params = Map::new();
        params.insert("chat_id".to_string(), json!(chat_id));
        params.insert("text".to_string(), json!(text));
        params.extend(into_params("sendMessage", options)?);
        self.call("sendMessage", Value::Object(params)).await
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        options: Value,
    ) -> Result<bool, ApiError> {
        let mut params = into_params("answerCallbackQuery", options)?;
        params.insert("callback_query_id".to_string(), json!(callback_query_id));
        self.call_result("answerCallbackQuery", Value::Object(params))
            .await
    }

    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.call_result("getMe", Value::Null).await
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<bool, ApiError> {
        let mut params = Map::new();
        params.insert("url".to_string(), json!(url));
        if let Some(secret) = secret_token {
            params.insert("secret_token".to_string(), json!(secret));
        }
        self.call_result("setWebhook", Value::Object(params)).await
    }

    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool, ApiError> {
        self.call_result(
            "deleteWebhook",
            json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await
    }

    pub async fn get_webhook_info(&self) -> Result<Value, ApiError> {
        self.call_result("getWebhookInfo", Value::Null).await
    }
}

/// Method names go into the URL path, so only plain identifiers are accepted.
fn validate_method(method: &str) -> Result<(), ApiError> {
    if !method.is_empty() && method.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ApiError::InvalidMethod(method.to_string()))
    }
}

pub(crate) fn into_params(method: &str, params: Value) -> Result<Map<String, Value>, ApiError> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ApiError::InvalidParams {
            method: method.to_string(),
        }),
    }
}
