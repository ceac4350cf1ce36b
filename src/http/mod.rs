//! HTTP protocol layer module
//!
//! Response bodies and builders, cache directives and MIME guessing, kept
//! apart from the reader's proxy logic.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_400_response, build_404_response, build_405_response, build_500_response,
    build_502_response, build_health_response, build_options_response, ProxyBody,
};
