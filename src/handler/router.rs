//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation,
//! route matching, dispatching and access logging.

use crate::config::AppState;
use crate::handler::reader::{self, ReaderRequest};
use crate::http::{self, ProxyBody};
use crate::logger::{self, AccessLogEntry};
use crate::proxy::Access;
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
///
/// The request body is never read: every route is `GET`/`HEAD`.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ProxyBody>, Infallible> {
    let started = Instant::now();
    let response = route_request(&req, &state).await;

    if state.config.logging.access_log {
        let entry = access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route_request<B>(req: &Request<B>, state: &AppState) -> Response<ProxyBody> {
    // 1. Check HTTP method
    if let Some(resp) = check_http_method(req.method(), state.config.http.enable_cors) {
        return resp;
    }

    // 2. Log headers if enabled
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let path = req.uri().path();

    // 3. Health check endpoints
    let health = &state.config.health;
    if health.enabled {
        if path == health.liveness_path {
            return http::build_health_response("ok");
        }
        if path == health.readiness_path {
            return readiness(state);
        }
    }

    // 4. Reader route
    let prefix = &state.config.proxy.route_prefix;
    let remainder = path
        .strip_prefix(prefix.as_str())
        .or_else(|| (path == prefix.trim_end_matches('/')).then_some(""));

    match remainder {
        Some(rest) => {
            let ctx = ReaderRequest {
                path: rest,
                query: req.uri().query(),
                is_head: req.method() == Method::HEAD,
            };
            reader::serve(&ctx, state).await
        }
        None => http::build_404_response(),
    }
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<ProxyBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Ready once an object store origin is configured
fn readiness(state: &AppState) -> Response<ProxyBody> {
    if state.resolver.client().origin().is_ok() {
        http::build_health_response("ok")
    } else {
        http::response::build_text_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "object store origin not configured",
        )
    }
}

fn access_entry<B>(
    req: &Request<B>,
    resp: &Response<ProxyBody>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string();
    entry.status = resp.status().as_u16();
    entry.body_bytes = resp
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry.upstream = resp.extensions().get::<Access>().map(|a| a.as_str());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state(origin: Option<&str>) -> Arc<AppState> {
        let mut config = Config::default();
        config.upstream.origin = origin.map(ToString::to_string);
        config.upstream.system_proxy = false;
        config.logging.access_log = false;
        Arc::new(AppState::new(config).unwrap())
    }

    async fn send(state: &Arc<AppState>, method: Method, uri: &str) -> Response<ProxyBody> {
        let req = Request::builder().method(method).uri(uri).body(()).unwrap();
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        handle_request(req, Arc::clone(state), peer).await.unwrap()
    }

    #[tokio::test]
    async fn test_method_checks() {
        let state = state(None);
        assert_eq!(
            send(&state, Method::POST, "/reader/a.html").await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            send(&state, Method::DELETE, "/reader/a.html").await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            send(&state, Method::OPTIONS, "/reader/a.html").await.status(),
            StatusCode::NO_CONTENT
        );
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let unconfigured = state(None);
        assert_eq!(
            send(&unconfigured, Method::GET, "/healthz").await.status(),
            StatusCode::OK
        );
        assert_eq!(
            send(&unconfigured, Method::GET, "/readyz").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let configured = state(Some("http://127.0.0.1:9"));
        assert_eq!(
            send(&configured, Method::GET, "/readyz").await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_unrouted_paths_are_not_found() {
        let state = state(None);
        for uri in ["/", "/index.html", "/readerx/a.html", "/api/reader/a.html"] {
            assert_eq!(
                send(&state, Method::GET, uri).await.status(),
                StatusCode::NOT_FOUND,
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn test_reader_prefix_without_object_is_bad_request() {
        let state = state(None);
        for uri in ["/reader", "/reader/", "/reader/../"] {
            assert_eq!(
                send(&state, Method::GET, uri).await.status(),
                StatusCode::BAD_REQUEST,
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn test_reader_route_reaches_resolver() {
        // No origin configured: a reader request gets as far as resolution
        let state = state(None);
        assert_eq!(
            send(&state, Method::GET, "/reader/book/index.html").await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_access_entry() {
        let req = Request::builder()
            .uri("/reader/book/index.html?v=1")
            .header("user-agent", "test-agent")
            .body(())
            .unwrap();
        let mut resp = http::build_404_response();
        resp.extensions_mut().insert(Access::Signed);
        resp.headers_mut()
            .insert("content-length", "13".parse().unwrap());

        let entry = access_entry(
            &req,
            &resp,
            "10.0.0.7:4242".parse().unwrap(),
            Instant::now(),
        );
        assert_eq!(entry.remote_addr, "10.0.0.7");
        assert_eq!(entry.path, "/reader/book/index.html");
        assert_eq!(entry.query.as_deref(), Some("v=1"));
        assert_eq!(entry.status, 404);
        assert_eq!(entry.body_bytes, Some(13));
        assert_eq!(entry.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(entry.upstream, Some("signed"));
    }
}
