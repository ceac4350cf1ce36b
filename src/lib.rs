//! Reader proxy
//!
//! Serves static web-app bundles stored in an object store from under a
//! path prefix on another origin, rewriting their HTML so relative and
//! root-absolute asset references keep working.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod proxy;
pub mod server;
