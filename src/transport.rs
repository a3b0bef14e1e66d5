//! The I/O seam between the executor and the network.
//!
//! A [`Transport`] performs exactly one exchange per call and never retries on
//! its own; retry and circuit-breaking decisions belong to the
//! [`Client`](crate::Client). [`ReqwestTransport`] is the production
//! implementation, and tests substitute their own.

use crate::error::{TransportError, TransportErrorKind};
use crate::request::PreparedRequest;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

/// A response as received off the wire, before status validation or decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The undecoded response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Creates a response whose body is `value` encoded as JSON.
    pub fn json<T: serde::Serialize + ?Sized>(
        status: StatusCode,
        value: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(status, serde_json::to_vec(value)?))
    }
}

/// Performs a single request/response exchange.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use breakwater::{PreparedRequest, RawResponse, Transport, TransportError};
/// use http::StatusCode;
///
/// #[derive(Debug)]
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl Transport for AlwaysOk {
///     async fn send(&self, _request: &PreparedRequest) -> Result<RawResponse, TransportError> {
///         Ok(RawResponse::new(StatusCode::OK, "{}"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the status, headers and body.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Message prefix of the error returned when the HTTP client cannot be built.
pub const CLIENT_CONSTRUCTION_FAILED: &str = "HTTP transport construction failed";

fn construction_error(error: &dyn StdError) -> crate::Error {
    crate::Error::InvalidRequest(format!("{}: {}", CLIENT_CONSTRUCTION_FAILED, error))
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with no per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`](crate::Error::InvalidRequest) if the
    /// underlying HTTP client cannot be constructed, for example when no TLS
    /// backend can be initialized. No request is involved; the message starts
    /// with [`CLIENT_CONSTRUCTION_FAILED`].
    pub fn new() -> crate::Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| construction_error(&e))?;
        Ok(Self::from_client(http_client))
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            timeout: None,
        }
    }

    /// Sets the deadline applied to each exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Maps a reqwest failure onto the transport taxonomy.
///
/// A connection counts as lost only when the peer went away mid-exchange.
/// Protocol violations, redirect and builder failures fall through to `Other`.
fn classify(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::TimedOut
    } else if error.is_connect() {
        TransportErrorKind::CannotConnectToHost
    } else if connection_dropped(&error) {
        TransportErrorKind::ConnectionLost
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, error.to_string())
}

/// Walks the source chain looking for a sign that the peer went away.
fn connection_dropped(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_is_labelled() {
        let cause = io::Error::new(io::ErrorKind::Other, "no TLS backend");
        let err = construction_error(&cause);

        match &err {
            crate::Error::InvalidRequest(message) => {
                assert!(message.starts_with(CLIENT_CONSTRUCTION_FAILED));
                assert!(message.ends_with("no TLS backend"));
            }
            other => panic!("Expected InvalidRequest, got {:?}", other),
        }
        assert!(!err.counts_against_endpoint());
    }
}
