//! # Breakwater - resilient HTTP request execution
//!
//! Breakwater executes outbound HTTP requests through one pipeline: a
//! per-endpoint circuit breaker gates the request, transient transport failures
//! are retried with exponential backoff, the status code is validated, and the
//! body is decoded into the caller's type. Every call yields either the decoded
//! value or exactly one [`Error`] variant.
//!
//! ## Quick Start
//!
//! ```no_run
//! use breakwater::{Client, Request};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Forecast {
//!     summary: String,
//!     high_celsius: f32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), breakwater::Error> {
//!     // Defaults: 3 attempts with 1s/2s backoff, circuit opens after
//!     // 5 consecutive failures and probes again after 60s
//!     let client = Client::builder().build()?;
//!
//!     let forecast: Forecast = client
//!         .execute(Request::get("https://api.example.com/forecast").with_query_param("city", "Oslo"))
//!         .await?;
//!     println!("{}: {}°C", forecast.summary, forecast.high_celsius);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Failure taxonomy
//!
//! | Variant | Retried | Counts against endpoint |
//! |---|---|---|
//! | [`Error::NetworkFailure`] | up to the policy limit | yes |
//! | [`Error::CircuitBreakerOpen`] | never attempted | no |
//! | [`Error::HttpError`] | never | yes |
//! | [`Error::DecodingFailure`] | never | no |
//! | [`Error::InvalidRequest`] | never attempted | no |
//!
//! Cancellation is reported as [`Cancelled`], never as an [`Error`].
//!
//! ## Testing against a fake network
//!
//! The [`Transport`] trait is the only I/O seam. Inject a test double and a
//! fresh [`CircuitBreaker`] per test:
//!
//! ```
//! use async_trait::async_trait;
//! use breakwater::{Client, PreparedRequest, RawResponse, RetryPolicy, Transport, TransportError};
//! use http::StatusCode;
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl Transport for Canned {
//!     async fn send(&self, _request: &PreparedRequest) -> Result<RawResponse, TransportError> {
//!         Ok(RawResponse::new(StatusCode::OK, "42"))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), breakwater::Error> {
//! let client = Client::builder()
//!     .transport(Canned)
//!     .retry_policy(RetryPolicy::no_retry())
//!     .build()?;
//!
//! let answer: u32 = client.get("https://api.example.com/answer").await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
mod client;
mod error;
mod request;
mod response;
pub mod retry;
mod transport;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{Client, ClientBuilder};
pub use error::{Cancelled, Error, Result, TransportError, TransportErrorKind};
pub use request::{Endpoint, PreparedRequest, Request};
pub use response::Response;
pub use retry::RetryPolicy;
pub use transport::{CLIENT_CONSTRUCTION_FAILED, RawResponse, ReqwestTransport, Transport};
