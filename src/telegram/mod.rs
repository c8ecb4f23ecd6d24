//! Telegram Bot API layer
//!
//! Update decoding, command parsing, the handler context and the API client.

pub mod api;
pub mod command;
pub mod context;
pub mod error;
pub mod update;

pub use api::ApiClient;
pub use context::Context;
pub use error::{ApiError, BotError};
pub use update::{Chat, Message, MessageEntity, Update, User};
