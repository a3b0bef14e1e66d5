//! Error types for resilient request execution.
//!
//! Every call through a [`Client`](crate::Client) resolves to either a decoded
//! value or exactly one [`Error`] variant. Transport-level failures are
//! described by [`TransportError`], and cancellation is reported separately via
//! [`Cancelled`] so it can never be mistaken for a failure of the endpoint.

use crate::request::Endpoint;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::time::{Duration, Instant};

/// The error taxonomy surfaced to callers.
///
/// # Examples
///
/// ```no_run
/// use breakwater::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.get::<serde_json::Value>("https://api.example.com/forecast").await {
///     Ok(value) => println!("Success: {:?}", value),
///     Err(Error::CircuitBreakerOpen { endpoint, .. }) => {
///         eprintln!("{} is shielded, serving cached data instead", endpoint);
///     }
///     Err(Error::HttpError { status, raw_response, .. }) => {
///         eprintln!("HTTP error {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A transport-level failure that was either not retryable or persisted
    /// through every attempt the retry policy allowed.
    #[error("Network failure after {attempts} attempt(s): {error}")]
    NetworkFailure {
        /// The failure reported by the final attempt
        #[source]
        error: TransportError,
        /// How many times the transport was invoked
        attempts: usize,
    },

    /// The endpoint's circuit is open; no request was sent.
    #[error("Circuit breaker open for {endpoint}")]
    CircuitBreakerOpen {
        /// The shielded endpoint
        endpoint: Endpoint,
        /// When the endpoint becomes eligible for a recovery probe, if representable
        reset_at: Option<Instant>,
    },

    /// The server returned a non-2xx status code.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// The server returned 2xx but the body did not match the expected type.
    ///
    /// Both the raw body and the serde message are preserved so the mismatch
    /// can be diagnosed from logs alone.
    #[error("Failed to decode response (status {status}): {serde_error}")]
    DecodingFailure {
        /// The raw response body that failed to decode
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The caller built a request that cannot be sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Returns `true` for the variants that count against the endpoint's health.
    ///
    /// Network failures and non-2xx responses are recorded as breaker failures;
    /// decode failures, open circuits and invalid requests are not.
    pub fn counts_against_endpoint(&self) -> bool {
        matches!(self, Error::NetworkFailure { .. } | Error::HttpError { .. })
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DecodingFailure { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if a response was received.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DecodingFailure { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the endpoint whose circuit rejected the request.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Error::CircuitBreakerOpen { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Returns how long until an open circuit admits a probe, measured from now.
    ///
    /// Returns `None` for every variant other than `CircuitBreakerOpen`, and
    /// for an open circuit whose cooldown has no representable end.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::CircuitBreakerOpen { reset_at, .. } => {
                reset_at.map(|at| at.saturating_duration_since(Instant::now()))
            }
            _ => None,
        }
    }
}

/// Classification of transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection dropped mid-exchange.
    ConnectionLost,
    /// The request did not complete within the transport's deadline.
    TimedOut,
    /// The host refused or could not be reached.
    CannotConnectToHost,
    /// The device has no network connectivity.
    NotConnectedToInternet,
    /// Any other transport failure (TLS, redirect loops, malformed responses...).
    Other,
}

impl TransportErrorKind {
    /// Returns `true` for the transient kinds worth repeating.
    pub fn is_retryable(self) -> bool {
        !matches!(self, TransportErrorKind::Other)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::CannotConnectToHost => "cannot connect to host",
            TransportErrorKind::NotConnectedToInternet => "not connected to internet",
            TransportErrorKind::Other => "transport error",
        };
        f.write_str(label)
    }
}

/// A failure reported by a [`Transport`](crate::Transport).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Creates a new `TransportError`.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the failure classification.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns the underlying message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the failure belongs to the retryable class.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// The caller cancelled the request before it completed.
///
/// Deliberately not an [`Error`] variant: a cancelled request says nothing
/// about the endpoint and is never recorded by the circuit breaker.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Request cancelled")]
pub struct Cancelled;

/// A specialized `Result` type for request execution.
pub type Result<T> = std::result::Result<T, Error>;
