//! Header model and response header policy
//!
//! `Headers` is an ordered multimap with case-insensitive names, decoupled from
//! the client and server HTTP types. `HeaderPolicy` decides what the
//! caller-facing headers look like once the upstream answer is known.

use hyper::header::HeaderMap;
use hyper::http::response::Builder;

use super::key::LogicalKey;
use crate::config::{CacheConfig, PolicyConfig};
use crate::http::cache::CachePolicy;
use crate::http::mime;

/// Headers that would stop the document rendering inside the reader's
/// embedding context
pub const STRIPPED_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-content-security-policy",
    "x-webkit-csp",
    "x-frame-options",
    "cross-origin-opener-policy",
    "cross-origin-embedder-policy",
    "cross-origin-resource-policy",
    "permissions-policy",
    "content-disposition",
    "x-content-type-options",
];

/// Connection-scoped headers never forwarded from upstream
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "trailer",
    "te",
];

/// CSP that still allows inline bootstrapping and same-origin connections
pub const RELAXED_CSP: &str = "default-src 'self' 'unsafe-inline' 'unsafe-eval' data: blob: https:; connect-src 'self' https:";

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Directory whose files are content-hashed by the bundler
const HASHED_ASSET_DIR: &str = "assets";

/// Ordered header multimap with case-insensitive names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Copy headers from an HTTP header map; non-UTF-8 values are decoded lossily
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let entries = map
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self { entries }
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value of `name` with `value`, keeping the position of the
    /// first occurrence
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= first || !n.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_string(), value.into()));
    }

    /// Remove every value of `name`; returns whether anything was removed
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every header onto a response builder
    pub fn apply_to(&self, builder: Builder) -> Builder {
        self.iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value))
    }
}

/// What kind of body the caller is about to receive
#[derive(Debug, Clone, Copy)]
pub enum ResponseKind<'a> {
    /// HTML rewritten by the bundle rewriter
    RewrittenHtml,
    /// HTML that could not be rewritten, passed through with its encoding
    EncodedHtml,
    /// Successful upstream body passed through byte-for-byte
    Passthrough { key: &'a LogicalKey },
    /// Upstream non-2xx answer passed through
    UpstreamError,
}

/// Response header policy
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    html: CachePolicy,
    hashed_asset: CachePolicy,
    asset: CachePolicy,
    relaxed_csp: bool,
}

impl HeaderPolicy {
    pub fn from_config(cache: &CacheConfig, policy: &PolicyConfig) -> Self {
        let html = if cache.html_max_age == 0 {
            CachePolicy::NoStore
        } else {
            CachePolicy::Private(cache.html_max_age)
        };
        Self {
            html,
            hashed_asset: CachePolicy::Immutable(cache.asset_max_age),
            asset: CachePolicy::Revalidate {
                max_age: cache.revalidate_max_age,
                stale_while_revalidate: cache.stale_while_revalidate,
            },
            relaxed_csp: policy.relaxed_csp,
        }
    }

    /// Adjust upstream headers for the caller
    pub fn apply(&self, headers: &mut Headers, kind: ResponseKind<'_>) {
        for name in HOP_BY_HOP_HEADERS.iter().chain(STRIPPED_HEADERS) {
            headers.delete(name);
        }

        match kind {
            ResponseKind::RewrittenHtml => {
                headers.delete("content-length");
                headers.delete("etag");
                headers.delete("content-md5");
                headers.set("content-type", HTML_CONTENT_TYPE);
                headers.set("cache-control", self.html.to_header_value());
            }
            ResponseKind::EncodedHtml => {
                if needs_content_type_guess(headers.get("content-type")) {
                    headers.set("content-type", HTML_CONTENT_TYPE);
                }
                headers.set("cache-control", self.html.to_header_value());
            }
            ResponseKind::Passthrough { key } => {
                if needs_content_type_guess(headers.get("content-type")) {
                    let guessed = mime::guess(key);
                    headers.set("content-type", guessed);
                }
                let cache = if key.has_dir(HASHED_ASSET_DIR) {
                    self.hashed_asset
                } else {
                    self.asset
                };
                headers.set("cache-control", cache.to_header_value());
            }
            ResponseKind::UpstreamError => {
                headers.set("cache-control", CachePolicy::NoStore.to_header_value());
            }
        }

        if self.relaxed_csp {
            headers.set("content-security-policy", RELAXED_CSP);
        }
    }
}

/// Upstream sent no useful content type
pub fn needs_content_type_guess(content_type: Option<&str>) -> bool {
    content_type.map_or(true, |ct| {
        let ct = ct.trim();
        ct.is_empty() || ct.to_ascii_lowercase().starts_with("application/octet-stream")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::key::sanitize;

    fn policy(relaxed_csp: bool) -> HeaderPolicy {
        HeaderPolicy::from_config(
            &CacheConfig::default(),
            &PolicyConfig {
                relaxed_csp,
                disable_service_worker: true,
            },
        )
    }

    fn upstream_headers() -> Headers {
        let mut h = Headers::new();
        h.append("Content-Type", "text/html");
        h.append("Content-Length", "1234");
        h.append("Content-Security-Policy", "default-src 'none'");
        h.append("X-Frame-Options", "DENY");
        h.append("Cross-Origin-Embedder-Policy", "require-corp");
        h.append("Transfer-Encoding", "chunked");
        h.append("ETag", "\"abc\"");
        h.append("Set-Cookie", "a=1");
        h.append("Set-Cookie", "b=2");
        h
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut h = Headers::new();
        h.append("Content-Type", "image/png");
        assert_eq!(h.get("content-type"), Some("image/png"));
        assert!(h.contains("CONTENT-TYPE"));
        assert!(h.delete("content-TYPE"));
        assert!(!h.delete("content-type"));
        assert!(h.is_empty());
    }

    #[test]
    fn test_headers_set_keeps_first_position() {
        let mut h = Headers::new();
        h.append("a", "1");
        h.append("Vary", "x");
        h.append("b", "2");
        h.append("vary", "y");
        h.set("VARY", "z");
        let names: Vec<_> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "Vary", "b"]);
        assert_eq!(h.get_all("vary").collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn test_headers_multimap() {
        let h = upstream_headers();
        assert_eq!(h.get_all("set-cookie").count(), 2);
        assert_eq!(h.len(), 9);
    }

    #[test]
    fn test_from_header_map() {
        let mut map = HeaderMap::new();
        map.insert("content-type", "text/css".parse().unwrap());
        map.append("x-multi", "1".parse().unwrap());
        map.append("x-multi", "2".parse().unwrap());
        let h = Headers::from_header_map(&map);
        assert_eq!(h.get("Content-Type"), Some("text/css"));
        assert_eq!(h.get_all("x-multi").collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_policy_always_strips_blocking_headers() {
        let key = sanitize(["book/photo.png"]).unwrap();
        for kind in [
            ResponseKind::RewrittenHtml,
            ResponseKind::EncodedHtml,
            ResponseKind::Passthrough { key: &key },
            ResponseKind::UpstreamError,
        ] {
            let mut h = upstream_headers();
            policy(false).apply(&mut h, kind);
            assert!(!h.contains("content-security-policy"));
            assert!(!h.contains("x-frame-options"));
            assert!(!h.contains("cross-origin-embedder-policy"));
            assert!(!h.contains("transfer-encoding"));
            assert_eq!(h.get_all("set-cookie").count(), 2);
        }
    }

    #[test]
    fn test_policy_encoded_html_keeps_body_headers() {
        let mut h = upstream_headers();
        h.set("content-encoding", "gzip");
        h.set("content-length", "42");
        policy(false).apply(&mut h, ResponseKind::EncodedHtml);
        assert_eq!(h.get("content-encoding"), Some("gzip"));
        assert_eq!(h.get("content-length"), Some("42"));
        assert_eq!(h.get("cache-control"), Some("no-store"));
    }

    #[test]
    fn test_policy_html() {
        let mut h = upstream_headers();
        policy(false).apply(&mut h, ResponseKind::RewrittenHtml);
        assert_eq!(h.get("content-type"), Some(HTML_CONTENT_TYPE));
        assert_eq!(h.get("cache-control"), Some("no-store"));
        assert!(!h.contains("content-length"));
        assert!(!h.contains("etag"));
    }

    #[test]
    fn test_policy_passthrough_keeps_length_and_type() {
        let key = sanitize(["book/assets/index-abc123.js"]).unwrap();
        let mut h = Headers::new();
        h.append("content-type", "application/javascript");
        h.append("content-length", "42");
        policy(false).apply(&mut h, ResponseKind::Passthrough { key: &key });
        assert_eq!(h.get("content-length"), Some("42"));
        assert_eq!(h.get("content-type"), Some("application/javascript"));
        assert_eq!(h.get("cache-control"), Some("public, max-age=31536000, immutable"));
    }

    #[test]
    fn test_policy_semi_static_asset_revalidates() {
        let key = sanitize(["book/manifest.json"]).unwrap();
        let mut h = Headers::new();
        h.append("content-type", "application/json");
        policy(false).apply(&mut h, ResponseKind::Passthrough { key: &key });
        assert_eq!(
            h.get("cache-control"),
            Some("public, max-age=3600, s-maxage=3600, stale-while-revalidate=86400")
        );
    }

    #[test]
    fn test_policy_guesses_missing_content_type() {
        let key = sanitize(["book/cover.webp"]).unwrap();
        let mut h = Headers::new();
        h.append("content-type", "application/octet-stream");
        policy(false).apply(&mut h, ResponseKind::Passthrough { key: &key });
        assert_eq!(h.get("content-type"), Some("image/webp"));
    }

    #[test]
    fn test_policy_upstream_error_not_cached() {
        let mut h = upstream_headers();
        policy(false).apply(&mut h, ResponseKind::UpstreamError);
        assert_eq!(h.get("cache-control"), Some("no-store"));
        assert_eq!(h.get("content-length"), Some("1234"));
    }

    #[test]
    fn test_relaxed_csp() {
        let mut h = upstream_headers();
        policy(true).apply(&mut h, ResponseKind::RewrittenHtml);
        assert_eq!(h.get_all("content-security-policy").collect::<Vec<_>>(), vec![RELAXED_CSP]);
    }

    #[test]
    fn test_needs_content_type_guess() {
        assert!(needs_content_type_guess(None));
        assert!(needs_content_type_guess(Some("")));
        assert!(needs_content_type_guess(Some("Application/Octet-Stream")));
        assert!(!needs_content_type_guess(Some("image/png")));
    }
}
