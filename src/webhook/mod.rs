//! Webhook handler module
//!
//! Receives Telegram's update POSTs and hands them to the router.

pub mod endpoint;

// Re-export main entry point
pub use endpoint::{handle_request, HEALTH_PATH, SECRET_TOKEN_HEADER};
