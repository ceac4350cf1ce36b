//! Request handler module
//!
//! Responsible for request routing dispatch and the reader route itself.

pub mod reader;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
