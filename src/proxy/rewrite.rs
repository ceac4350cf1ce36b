//! Bundle HTML rewriting
//!
//! Patches the HTML entry point of a statically exported single-page app so it
//! loads from an arbitrary path prefix instead of the site root it was built
//! for. This is a fixed set of pattern substitutions over the markup Vite-style
//! exports produce, not an HTML transformer: only the enumerated attribute
//! prefixes are touched and every other absolute path is left as-is.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Opening `<head>` tag, possibly self-closed; `<header>` never matches
static HEAD_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<head(?:[\s/][^>]*)?>").expect("valid head pattern"));

static HTML_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<html(\s[^>]*)?>").expect("valid html pattern"));

/// Root-absolute `href`/`src` references emitted by the bundler
static ROOT_ABSOLUTE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(href|src)=(["'])/((?:assets|icons|images|img)/|favicon\.ico|manifest\.json|manifest\.webmanifest)"#,
    )
    .expect("valid reference pattern")
});

/// Leading doctype; nothing may precede it without triggering quirks mode
static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\A\s*<!doctype[^>]*>").expect("valid doctype pattern"));

static SCRIPT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script[\s>]").expect("valid script pattern"));

static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("valid head close pattern"));

/// Replaces service worker registration with a promise that never settles
pub const SERVICE_WORKER_STUB: &str = "<script>(function(){if('serviceWorker' in navigator){try{navigator.serviceWorker.register=function(){return new Promise(function(){});};}catch(e){}}})();</script>";

/// Per-request rewrite input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    /// Directory-level path the document is served under; always ends in `/`
    pub external_base_path: String,
}

impl RewriteContext {
    pub fn new(external_base_path: impl Into<String>) -> Self {
        let mut external_base_path = external_base_path.into();
        if !external_base_path.ends_with('/') {
            external_base_path.push('/');
        }
        Self { external_base_path }
    }
}

/// Rewrite options that come from configuration
#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions {
    pub disable_service_worker: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            disable_service_worker: true,
        }
    }
}

/// Rewrite a bundle's HTML for serving under `ctx.external_base_path`
///
/// Must be called once per fetched document: the `<base>` injection is not
/// idempotent.
///
/// # Examples
/// ```
/// use reader_proxy::proxy::rewrite::{rewrite_html, RewriteContext, RewriteOptions};
/// let ctx = RewriteContext::new("/reader/book/");
/// let opts = RewriteOptions { disable_service_worker: false };
/// let html = rewrite_html(r#"<head><link href="/assets/app.css"></head>"#, &ctx, opts);
/// assert_eq!(html, r#"<head><base href="/reader/book/"><link href="assets/app.css"></head>"#);
/// ```
pub fn rewrite_html(html: &str, ctx: &RewriteContext, options: RewriteOptions) -> String {
    let html = inject_base(html, &ctx.external_base_path);
    let html = relativize_references(&html);
    if options.disable_service_worker {
        inject_service_worker_stub(&html)
    } else {
        html
    }
}

/// Insert `<base href>` as the first child of `<head>`
///
/// Falls back to right after `<html>`, then after a leading doctype, then to
/// the start of the document.
pub fn inject_base(html: &str, base_href: &str) -> String {
    let base = format!(r#"<base href="{}">"#, escape_attribute(base_href));

    let anchor = HEAD_OPEN
        .find(html)
        .or_else(|| HTML_OPEN.find(html))
        .or_else(|| DOCTYPE.find(html))
        .map_or(0, |m| m.end());

    let mut out = String::with_capacity(html.len() + base.len());
    out.push_str(&html[..anchor]);
    out.push_str(&base);
    out.push_str(&html[anchor..]);
    out
}

/// Turn root-absolute asset references into relative ones
///
/// The attribute name and quote style are preserved; only the leading slash is
/// removed. Idempotent.
pub fn relativize_references(html: &str) -> String {
    ROOT_ABSOLUTE_REF
        .replace_all(html, |caps: &Captures<'_>| {
            format!("{}={}{}", &caps[1], &caps[2], &caps[3])
        })
        .into_owned()
}

/// Insert the service worker stub before the first `<script>`, else before
/// `</head>`; documents with neither are returned unchanged
pub fn inject_service_worker_stub(html: &str) -> String {
    let Some(position) = SCRIPT_OPEN
        .find(html)
        .or_else(|| HEAD_CLOSE.find(html))
        .map(|m| m.start())
    else {
        return html.to_string();
    };

    let mut out = String::with_capacity(html.len() + SERVICE_WORKER_STUB.len());
    out.push_str(&html[..position]);
    out.push_str(SERVICE_WORKER_STUB);
    out.push_str(&html[position..]);
    out
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
