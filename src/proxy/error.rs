//! Reader proxy errors

use hyper::StatusCode;
use thiserror::Error;

/// Errors surfaced by the reader proxy
///
/// An upstream non-2xx answer is not an error: it is passed through as-is.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No usable path segment survived sanitization
    #[error("missing object path")]
    MissingPath,

    /// A required deployment setting is absent
    #[error("missing configuration: {setting}")]
    MissingConfiguration { setting: &'static str },

    /// The object store could not be reached
    #[error("upstream unavailable at {url}: {source}")]
    UpstreamUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A signed URL could not be issued
    #[error("signed url issuance failed: {message}")]
    Signing { message: String },
}

impl ProxyError {
    /// Status code returned to the caller for this error
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingPath => StatusCode::BAD_REQUEST,
            Self::MissingConfiguration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamUnavailable { .. } | Self::Signing { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-caused error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}
