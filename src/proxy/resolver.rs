//! Object resolution against the storage backend
//!
//! `StorageClient` is built once at startup and shared by every request.
//! `ObjectResolver` turns a `LogicalKey` into an `UpstreamDocument`, trying the
//! public object URL first and falling back to a signed URL when the public
//! read is refused and a service key is configured. Every fetch is a single
//! attempt.

use futures::Stream;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error::ProxyError;
use super::headers::Headers;
use super::key::LogicalKey;
use crate::config::UpstreamConfig;
use crate::logger;

const STORAGE_API: &str = "/storage/v1";

/// Public statuses that trigger the signed fallback
const FALLBACK_STATUSES: &[StatusCode] = &[
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
];

/// Which access path produced a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Signed,
}

impl Access {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Signed => "signed",
        }
    }
}

/// Upstream answer for one request
///
/// The body is still unread: callers either stream it through or buffer it.
#[derive(Debug)]
pub struct UpstreamDocument {
    pub status: StatusCode,
    pub headers: Headers,
    pub access: Access,
    response: reqwest::Response,
}

impl UpstreamDocument {
    fn from_response(response: reqwest::Response, access: Access) -> Self {
        Self {
            status: response.status(),
            headers: Headers::from_header_map(response.headers()),
            access,
            response,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Content-encoding other than identity
    pub fn is_encoded(&self) -> bool {
        self.headers
            .get("content-encoding")
            .is_some_and(|e| !e.trim().is_empty() && !e.trim().eq_ignore_ascii_case("identity"))
    }

    /// Read the whole body into memory
    pub async fn bytes(self) -> Result<Bytes, ProxyError> {
        let mut url = self.response.url().clone();
        url.set_query(None);
        self.response
            .bytes()
            .await
            .map_err(|source| ProxyError::UpstreamUnavailable {
                url: url.to_string(),
                source: source.without_url(),
            })
    }

    /// Body as a byte stream, for passthrough
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
        self.response.bytes_stream()
    }
}

#[derive(Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// HTTP client for the object store
///
/// The origin is read per request so a missing setting surfaces as
/// `MissingConfiguration` instead of a startup failure.
#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    origin: Option<String>,
    service_key: Option<String>,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("origin", &self.origin)
            .field("service_key", &self.service_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("reader-proxy/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout));
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            origin: config
                .origin
                .as_deref()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty()),
            service_key: config
                .service_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn origin(&self) -> Result<&str, ProxyError> {
        self.origin
            .as_deref()
            .ok_or(ProxyError::MissingConfiguration {
                setting: "upstream.origin",
            })
    }

    pub const fn can_sign(&self) -> bool {
        self.service_key.is_some()
    }

    /// `{origin}/storage/v1/object/public/{bucket}/{key}[?query]`
    pub fn public_object_url(
        &self,
        bucket: &str,
        key: &LogicalKey,
        query: Option<&str>,
    ) -> Result<String, ProxyError> {
        let url = format!(
            "{}{STORAGE_API}/object/public/{bucket}/{}",
            self.origin()?,
            key.to_url_path()
        );
        Ok(with_query(url, query))
    }

    /// Issue a time-limited URL for `key`
    pub async fn create_signed_url(
        &self,
        bucket: &str,
        key: &LogicalKey,
        ttl: Duration,
    ) -> Result<String, ProxyError> {
        let origin = self.origin()?;
        let service_key = self
            .service_key
            .as_deref()
            .ok_or(ProxyError::MissingConfiguration {
                setting: "upstream.service_key",
            })?;
        let url = format!("{origin}{STORAGE_API}/object/sign/{bucket}/{}", key.to_url_path());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(service_key)
            .header("apikey", service_key)
            .json(&SignRequest {
                expires_in: ttl.as_secs(),
            })
            .send()
            .await
            .map_err(|source| ProxyError::UpstreamUnavailable {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProxyError::Signing {
                message: format!("{status}: {}", message.trim()),
            });
        }

        let signed: SignResponse = resp.json().await.map_err(|e| ProxyError::Signing {
            message: format!("unexpected sign response: {e}"),
        })?;

        Ok(absolute_signed_url(origin, &signed.signed_url))
    }

    /// Single GET asking for an unencoded body
    ///
    /// The query is left out of the error since signed URLs carry a token there.
    async fn fetch(&self, url: &str) -> Result<reqwest::Response, ProxyError> {
        self.http
            .get(url)
            .header("accept-encoding", "identity")
            .send()
            .await
            .map_err(|source| ProxyError::UpstreamUnavailable {
                url: url.split('?').next().unwrap_or(url).to_string(),
                source: source.without_url(),
            })
    }
}

/// Maps keys to upstream documents for one bucket
#[derive(Debug, Clone)]
pub struct ObjectResolver {
    client: Arc<StorageClient>,
    bucket: String,
    signed_bucket: String,
    signed_url_ttl: Duration,
}

impl ObjectResolver {
    pub fn new(client: Arc<StorageClient>, config: &UpstreamConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            signed_bucket: config
                .signed_bucket
                .clone()
                .unwrap_or_else(|| config.bucket.clone()),
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl),
        }
    }

    pub fn client(&self) -> &StorageClient {
        &self.client
    }

    /// Fetch `key`, forwarding `query` unchanged
    ///
    /// Upstream failures other than network errors are returned as documents,
    /// not errors.
    pub async fn resolve(
        &self,
        key: &LogicalKey,
        query: Option<&str>,
    ) -> Result<UpstreamDocument, ProxyError> {
        let url = self.client.public_object_url(&self.bucket, key, query)?;
        logger::log_debug(&format!("[Upstream] GET {url}"));
        let public = self.client.fetch(&url).await?;

        if !FALLBACK_STATUSES.contains(&public.status()) || !self.client.can_sign() {
            return Ok(UpstreamDocument::from_response(public, Access::Public));
        }

        logger::log_debug(&format!(
            "[Upstream] Public read of '{key}' returned {}, trying signed access",
            public.status()
        ));

        let signed_url = match self
            .client
            .create_signed_url(&self.signed_bucket, key, self.signed_url_ttl)
            .await
        {
            Ok(u) => u,
            Err(e) => {
                logger::log_warning(&format!("Signed access for '{key}' unavailable: {e}"));
                return Ok(UpstreamDocument::from_response(public, Access::Public));
            }
        };

        let signed = self.client.fetch(&with_query(signed_url, query)).await?;
        Ok(UpstreamDocument::from_response(signed, Access::Signed))
    }
}

fn with_query(mut url: String, query: Option<&str>) -> String {
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(q);
    }
    url
}

fn absolute_signed_url(origin: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_string();
    }
    let path = signed.trim_start_matches('/');
    format!("{origin}{STORAGE_API}/{path}")
}
