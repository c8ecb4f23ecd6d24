//! Error types for the Bot API client and update dispatch.

use thiserror::Error;

/// Failure of a single Bot API method call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid method name: {0:?}")]
    InvalidMethod(String),

    #[error("parameters for {method} must be a JSON object")]
    InvalidParams { method: String },

    #[error("request to {method} failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned an undecodable body: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method} failed ({code}): {description}")]
    Telegram {
        method: String,
        code: i64,
        description: String,
    },
}

impl ApiError {
    /// Wrap a transport error with the bot token stripped from its URL.
    pub(crate) fn transport(method: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            method: method.to_string(),
            source: source.without_url(),
        }
    }

    pub(crate) fn decode(method: &str, source: serde_json::Error) -> Self {
        Self::Decode {
            method: method.to_string(),
            source,
        }
    }
}

/// Error returned from update handlers and dispatch.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("handler failed: {0}")]
    Handler(String),
}

impl BotError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}
