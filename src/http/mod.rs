//! HTTP protocol layer module
//!
//! Response builders shared by the webhook endpoint, decoupled from update handling.

pub mod response;

// Re-export commonly used builders
pub use response::{
    build_400_response, build_401_response, build_404_response, build_405_response,
    build_408_response, build_413_response, build_ack_response, build_health_response,
};
