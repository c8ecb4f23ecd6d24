//! Routing module
//!
//! Dispatches decoded updates to registered handlers:
//! - Event handlers keyed by update field
//! - Command handlers matched against `bot_command` entities
//! - Exact-match text handlers

mod matcher;
mod router;

pub use matcher::TextMatch;
pub use router::{Dispatch, HandlerResult, Matched, Router};
