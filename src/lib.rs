//! Webhook-driven Telegram Bot API router.
//!
//! Telegram POSTs each update to the webhook endpoint; the update is decoded,
//! dispatched to registered command, text and event handlers, and handlers
//! talk back through a client that forwards any Bot API method.
//!
//! ```no_run
//! use serde_json::Value;
//! use telegram_webhook::routing::Router;
//! use telegram_webhook::telegram::BotError;
//!
//! let mut router = Router::new();
//! router.command("/start", |ctx, _message| async move {
//!     ctx.reply("Hello!", Value::Null).await?;
//!     Ok::<_, BotError>(())
//! });
//! ```

pub mod config;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;
pub mod telegram;
pub mod webhook;
