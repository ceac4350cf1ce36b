//! HTTP response building module
//!
//! Body type shared by every handler plus builders for the fixed status
//! responses the reader produces itself.

use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::{Response, StatusCode};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body: either buffered or streamed from upstream
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Buffered body
pub fn full(data: impl Into<Bytes>) -> ProxyBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Streamed body over a fallible byte stream
pub fn stream<S, E>(source: S) -> ProxyBody
where
    S: futures::Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError>,
{
    StreamBody::new(
        source
            .map_ok(Frame::data)
            .map_err(|e| -> BoxError { e.into() }),
    )
    .boxed_unsync()
}

/// Plain-text response with the given status
pub fn build_text_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Cache-Control", "no-store")
        .body(full(message.to_string()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status)
        })
}

/// Build 400 Bad Request response
pub fn build_400_response(message: &str) -> Response<ProxyBody> {
    build_text_response(StatusCode::BAD_REQUEST, &format!("400 Bad Request: {message}"))
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ProxyBody> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "text/plain")
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(full("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            fallback(StatusCode::METHOD_NOT_ALLOWED)
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response(message: &str) -> Response<ProxyBody> {
    build_text_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &format!("500 Internal Server Error: {message}"),
    )
}

/// Build 502 Bad Gateway response
pub fn build_502_response() -> Response<ProxyBody> {
    build_text_response(StatusCode::BAD_GATEWAY, "502 Bad Gateway: object store unavailable")
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<ProxyBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "GET, HEAD, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, HEAD, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type, Range")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(empty()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        fallback(StatusCode::NO_CONTENT)
    })
}

/// Build health check response
pub fn build_health_response(status: &str) -> Response<ProxyBody> {
    build_text_response(StatusCode::OK, status)
}

fn fallback(status: StatusCode) -> Response<ProxyBody> {
    let mut resp = Response::new(empty());
    *resp.status_mut() = status;
    resp
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(resp: Response<ProxyBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_text_responses() {
        let resp = build_400_response("missing object path");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()["cache-control"], "no-store");
        assert!(body_string(resp).await.contains("missing object path"));

        assert_eq!(build_502_response().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            build_500_response("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_options_cors() {
        let resp = build_options_response(true);
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert!(!build_options_response(false)
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_stream_body() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let body = stream(futures::stream::iter(chunks));
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"abcd");
    }
}
