//! Reader route
//!
//! Serves bundle files from the object store below the reader prefix: the
//! path is sanitized into a key, the object is resolved, HTML documents are
//! rewritten to load from under the prefix, and every response goes through
//! the header policy. Non-HTML bodies are streamed, HTML bodies buffered.

use hyper::{Response, StatusCode};

use crate::config::{AppState, ProxyConfig};
use crate::http::{self, ProxyBody};
use crate::logger;
use crate::proxy::headers::needs_content_type_guess;
use crate::proxy::key::sanitize_counted;
use crate::proxy::{
    rewrite_html, Access, Headers, LogicalKey, ProxyError, ResponseKind, RewriteContext,
    UpstreamDocument,
};

/// A request below the reader prefix
#[derive(Debug, Clone, Copy)]
pub struct ReaderRequest<'a> {
    /// Path after the route prefix, still percent-encoded
    pub path: &'a str,
    /// Raw query string, forwarded unchanged
    pub query: Option<&'a str>,
    pub is_head: bool,
}

/// Serve one reader request; failures become error responses
pub async fn serve(req: &ReaderRequest<'_>, state: &AppState) -> Response<ProxyBody> {
    match try_serve(req, state).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

async fn try_serve(
    req: &ReaderRequest<'_>,
    state: &AppState,
) -> Result<Response<ProxyBody>, ProxyError> {
    let key = resolve_key(req.path, &state.config.proxy.index_file)?;
    let mut doc = state.resolver.resolve(&key, req.query).await?;

    let status = doc.status;
    let access = doc.access;
    let encoded = doc.is_encoded();
    let html = is_html_document(doc.content_type(), &key);
    let mut headers = std::mem::take(&mut doc.headers);

    if !doc.is_success() {
        logger::log_debug(&format!(
            "[Reader] Upstream answered {status} for '{key}' ({} access)",
            access.as_str()
        ));
        state
            .header_policy
            .apply(&mut headers, ResponseKind::UpstreamError);
        return Ok(build_response(status, &headers, access, passthrough_body(doc, req.is_head)));
    }

    if html && !encoded {
        state
            .header_policy
            .apply(&mut headers, ResponseKind::RewrittenHtml);
        if req.is_head {
            drop(doc);
            return Ok(build_response(status, &headers, access, http::response::empty()));
        }

        let raw = doc.bytes().await?;
        let ctx = RewriteContext::new(external_base_path(&state.config.proxy, &key));
        let html = rewrite_html(&String::from_utf8_lossy(&raw), &ctx, state.rewrite_options);
        headers.set("content-length", html.len().to_string());
        return Ok(build_response(
            status,
            &headers,
            access,
            http::response::full(html),
        ));
    }

    let kind = if html {
        logger::log_warning(&format!(
            "[Reader] '{key}' arrived with content-encoding {}, serving without rewrite",
            headers.get("content-encoding").unwrap_or_default()
        ));
        ResponseKind::EncodedHtml
    } else {
        ResponseKind::Passthrough { key: &key }
    };
    state.header_policy.apply(&mut headers, kind);
    Ok(build_response(status, &headers, access, passthrough_body(doc, req.is_head)))
}

/// Sanitize the request path, appending the index file for directory requests
fn resolve_key(path: &str, index_file: &str) -> Result<LogicalKey, ProxyError> {
    let sanitized = sanitize_counted(path.split('/'))?;
    if sanitized.dropped_traversal > 0 {
        logger::log_warning(&format!(
            "[Reader] Dropped {} traversal segment(s) from '{path}'",
            sanitized.dropped_traversal
        ));
    }

    if path.ends_with('/') {
        Ok(sanitized.key.join(index_file))
    } else {
        Ok(sanitized.key)
    }
}

/// Directory the document is served from, as seen by the browser
///
/// Always ends with `/`.
pub fn external_base_path(proxy: &ProxyConfig, key: &LogicalKey) -> String {
    let prefix = proxy
        .public_base_path
        .as_deref()
        .unwrap_or(&proxy.route_prefix);

    let mut base = prefix.trim_end_matches('/').to_string();
    base.push('/');

    let parent = key.parent_url_path();
    if !parent.is_empty() {
        base.push_str(&parent);
        base.push('/');
    }
    base
}

/// Rewrite candidates: declared HTML, or untyped content with an HTML extension
fn is_html_document(content_type: Option<&str>, key: &LogicalKey) -> bool {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("text/html") => true,
        ct if needs_content_type_guess(ct) => {
            matches!(key.extension().as_deref(), Some("html" | "htm"))
        }
        _ => false,
    }
}

fn passthrough_body(doc: UpstreamDocument, is_head: bool) -> ProxyBody {
    if is_head {
        http::response::empty()
    } else {
        http::response::stream(doc.into_stream())
    }
}

fn build_response(
    status: StatusCode,
    headers: &Headers,
    access: Access,
    body: ProxyBody,
) -> Response<ProxyBody> {
    headers
        .apply_to(Response::builder().status(status))
        .extension(access)
        .body(body)
        .unwrap_or_else(|e| {
            logger::log_error(&format!("[Reader] Failed to build {status} response: {e}"));
            http::build_502_response()
        })
}

fn error_response(err: &ProxyError) -> Response<ProxyBody> {
    if err.is_client_error() {
        logger::log_debug(&format!("[Reader] Rejected request: {err}"));
    } else {
        logger::log_error(&format!("[Reader] {err}"));
    }

    // Upstream detail stays in the log
    match err.status() {
        StatusCode::BAD_REQUEST => http::build_400_response(&err.to_string()),
        StatusCode::BAD_GATEWAY => http::build_502_response(),
        _ => http::build_500_response(&err.to_string()),
    }
}
