//! Foreign-origin bundle serving
//!
//! Path sanitization, object resolution, HTML rewriting and the response
//! header policy. The request handler in `crate::handler::reader` wires them
//! together.

pub mod error;
pub mod headers;
pub mod key;
pub mod resolver;
pub mod rewrite;

pub use error::ProxyError;
pub use headers::{HeaderPolicy, Headers, ResponseKind};
pub use key::{sanitize, LogicalKey};
pub use resolver::{Access, ObjectResolver, StorageClient, UpstreamDocument};
pub use rewrite::{rewrite_html, RewriteContext, RewriteOptions};
