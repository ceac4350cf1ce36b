//! HTTP cache control module
//!
//! Cache-Control directives applied by the reader's header policy.

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Browser-only cache with specified max-age (seconds)
    Private(u32),
    /// No store
    NoStore,
    /// Long-lived, content-addressed asset
    Immutable(u32),
    /// Shared cache with a stale-while-revalidate window
    Revalidate {
        max_age: u32,
        stale_while_revalidate: u32,
    },
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Private(max_age) => format!("private, max-age={max_age}"),
            Self::NoStore => "no-store".to_string(),
            Self::Immutable(max_age) => format!("public, max-age={max_age}, immutable"),
            Self::Revalidate {
                max_age,
                stale_while_revalidate,
            } => format!(
                "public, max-age={max_age}, s-maxage={max_age}, stale-while-revalidate={stale_while_revalidate}"
            ),
        }
    }
}
