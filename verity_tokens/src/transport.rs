//! The HTTP collaborator used to reach the authorization server
//!
//! The token lifecycle performs exactly one attempt per call through an
//! [`HttpTransport`]. Retries, pooling and rate limiting are the
//! transport's business, not this crate's.

use std::{error, fmt, sync::Arc};

use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;
use url::Url;

type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// An outgoing request
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Absolute request URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Vec<u8>,
}

impl fmt::Debug for HttpRequest {
    /// Bodies carry client secrets and tokens, so only their length is shown
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// A response as seen by the transport
#[derive(Debug)]
pub struct HttpResponse {
    /// Response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// The body decoded as UTF-8, with invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The transport failed to produce a response
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the transport's deadline
    #[error("request timed out")]
    Timeout(#[source] BoxError),
    /// A connection to the remote host could not be established
    #[error("connection failed")]
    Connection(#[source] BoxError),
    /// Any other failure while sending the request or reading the response
    #[error("transport failure")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// Constructs a timeout error
    pub fn timeout(source: impl Into<BoxError>) -> Self {
        Self::Timeout(source.into())
    }

    /// Constructs a connection error
    pub fn connection(source: impl Into<BoxError>) -> Self {
        Self::Connection(source.into())
    }

    /// Constructs an uncategorized error
    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::Other(source.into())
    }

    /// Whether this is a timeout
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Executes HTTP requests on behalf of the token lifecycle
///
/// Implementations must block until a response is available and must
/// report timeouts as [`TransportError::Timeout`] so that callers can tell
/// them apart from connection failures.
pub trait HttpTransport: Send + Sync {
    /// Sends a single request
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    #[inline]
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    #[inline]
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use std::time::Duration;

    use super::{HttpRequest, HttpResponse, HttpTransport, TransportError};

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// A transport backed by `reqwest`'s blocking client
    ///
    /// The blocking client must not be used from within an async runtime.
    /// This crate does not enable TLS in `reqwest` on its own; enable the
    /// `default-tls` or `rustls-tls` feature unless the application
    /// already does.
    #[derive(Clone, Debug)]
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        /// Builds a transport with a 30 second request timeout
        pub fn new() -> Result<Self, TransportError> {
            Self::with_timeout(DEFAULT_TIMEOUT)
        }

        /// Builds a transport with the given request timeout
        pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
            let client = reqwest::blocking::Client::builder()
                .user_agent(concat!("verity_tokens/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .map_err(TransportError::other)?;

            Ok(Self { client })
        }

        /// Wraps an already configured client
        pub fn from_client(client: reqwest::blocking::Client) -> Self {
            Self { client }
        }
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::timeout(err)
        } else if err.is_connect() {
            TransportError::connection(err)
        } else {
            TransportError::other(err)
        }
    }

    impl HttpTransport for ReqwestTransport {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let resp = self
                .client
                .request(request.method, request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .map_err(classify)?;

            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes().map_err(classify)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
