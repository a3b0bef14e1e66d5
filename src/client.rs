//! Request execution with retries and per-endpoint circuit breaking.
//!
//! The [`Client`] type is the single entry point for sending requests.
//! Use [`ClientBuilder`] to configure and create clients.
//!
//! Each execution runs the same pipeline:
//!
//! ```text
//! prepare ─▶ breaker.should_allow ─▶ transport ─┬─▶ non-2xx ──▶ record_failure, HttpError
//!                 │                      ▲      ├─▶ 2xx ──▶ decode ─┬─▶ record_success, T
//!                 ▼                      │      │                   └─▶ DecodingFailure
//!        CircuitBreakerOpen        sleep(delay) ◀─ retryable, attempts left
//!                                               └─▶ otherwise ──▶ record_failure, NetworkFailure
//! ```
//!
//! The breaker is updated at most once per execution, and only after the
//! transport has returned, so a dropped or cancelled future never touches it.

use crate::{
    circuit_breaker::CircuitBreaker,
    request::{PreparedRequest, Request},
    retry::RetryPolicy,
    transport::{RawResponse, ReqwestTransport, Transport},
    Cancelled, Error, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// An HTTP client that retries transient failures and shields failing endpoints.
///
/// Cloning is cheap; clones share the transport and the circuit breaker.
///
/// # Examples
///
/// ```no_run
/// use breakwater::{Client, Request, RetryPolicy};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct NewAlert {
///     region: String,
/// }
///
/// #[derive(Deserialize)]
/// struct Alert {
///     id: u64,
/// }
///
/// # async fn example() -> Result<(), breakwater::Error> {
/// let client = Client::builder()
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::new(3, Duration::from_millis(500)))
///     .build()?;
///
/// let alerts: Vec<Alert> = client.get("https://api.example.com/alerts").await?;
///
/// let created: Alert = client
///     .post("https://api.example.com/alerts", &NewAlert { region: "north".into() })
///     .await?;
/// println!("Created alert {} ({} pending)", created.id, alerts.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    circuit_breaker: Arc<CircuitBreaker>,
    default_headers: HeaderMap,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the circuit breaker this client reports to.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.inner.circuit_breaker
    }

    /// Returns the retry policy applied to transport failures.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry_policy
    }

    /// Executes `request` and decodes the body as `T`.
    ///
    /// # Errors
    ///
    /// Returns exactly one [`Error`] variant describing why no value was
    /// produced.
    pub async fn execute<T>(&self, request: Request) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send(request).await.map(Response::into_data)
    }

    /// Executes `request` unless `token` is cancelled first.
    ///
    /// The outer result is `Err(Cancelled)` when the token fired before the
    /// execution finished; the inner result is the execution's own outcome.
    /// Cancellation interrupts an in-flight exchange or backoff sleep and
    /// leaves the circuit breaker untouched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use breakwater::{Client, Request};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() -> Result<(), breakwater::Error> {
    /// let client = Client::builder().build()?;
    /// let token = CancellationToken::new();
    ///
    /// let request = Request::get("https://api.example.com/forecast");
    /// match client.execute_cancellable::<serde_json::Value>(request, &token).await {
    ///     Ok(outcome) => println!("Finished: {:?}", outcome?),
    ///     Err(cancelled) => println!("{}", cancelled),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute_cancellable<T>(
        &self,
        request: Request,
        token: &CancellationToken,
    ) -> std::result::Result<Result<T>, Cancelled>
    where
        T: DeserializeOwned,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("Request cancelled by caller");
                Err(Cancelled)
            }
            outcome = self.execute(request) => Ok(outcome),
        }
    }

    /// Executes `request` and returns the decoded body with its metadata.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn send<T>(&self, request: Request) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let prepared = request.prepare(&self.inner.default_headers)?;
        let endpoint = prepared.endpoint.clone();

        if let Err(open) = self.inner.circuit_breaker.should_allow(&endpoint) {
            tracing::warn!(
                endpoint = %endpoint,
                method = %prepared.method,
                "Request rejected, circuit open"
            );
            return Err(open.into());
        }

        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            tracing::debug!(
                method = %prepared.method,
                url = %prepared.url,
                attempt = attempt,
                "Executing HTTP request"
            );

            match self.inner.transport.send(&prepared).await {
                Ok(raw) => {
                    return self.complete(&prepared, raw, start_time.elapsed(), attempt);
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempt,
                        method = %prepared.method,
                        endpoint = %endpoint,
                        "Request failed"
                    );

                    if !self.inner.retry_policy.should_retry(&error, attempt) {
                        self.inner.circuit_breaker.record_failure(&endpoint);
                        return Err(Error::NetworkFailure {
                            error,
                            attempts: attempt,
                        });
                    }

                    let delay = self.inner.retry_policy.delay(attempt);
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Validates the status, decodes the body and reports to the breaker.
    fn complete<T>(
        &self,
        prepared: &PreparedRequest,
        raw: RawResponse,
        latency: Duration,
        attempts: usize,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let RawResponse {
            status,
            headers,
            body,
        } = raw;
        let endpoint = &prepared.endpoint;

        tracing::info!(
            status = status.as_u16(),
            endpoint = %endpoint,
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        let raw_body = String::from_utf8_lossy(&body).into_owned();

        if !status.is_success() {
            self.inner.circuit_breaker.record_failure(endpoint);

            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Client error (4xx)"
                );
            } else {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Non-success response"
                );
            }

            return Err(Error::HttpError {
                status,
                raw_response: raw_body,
                headers,
            });
        }

        // Decode failures are not recorded against the endpoint.
        match serde_json::from_slice::<T>(&body) {
            Ok(data) => {
                self.inner.circuit_breaker.record_success(endpoint);
                Ok(Response {
                    data,
                    raw_body,
                    status,
                    headers,
                    endpoint: endpoint.clone(),
                    latency,
                    attempts,
                })
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_response = %raw_body,
                    "Failed to decode response"
                );

                Err(Error::DecodingFailure {
                    raw_response: raw_body,
                    serde_error: e.to_string(),
                    status,
                })
            }
        }
    }

    /// Makes a GET request to `url`.
    pub async fn get<Res>(&self, url: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.execute(Request::get(url)).await
    }

    /// Makes a POST request to `url` with a JSON body.
    pub async fn post<Req, Res>(&self, url: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(Request::post(url).with_json(body)?).await
    }

    /// Makes a PUT request to `url` with a JSON body.
    pub async fn put<Req, Res>(&self, url: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(Request::put(url).with_json(body)?).await
    }

    /// Makes a PATCH request to `url` with a JSON body.
    pub async fn patch<Req, Res>(&self, url: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.execute(Request::patch(url).with_json(body)?).await
    }

    /// Makes a DELETE request to `url`.
    pub async fn delete<Res>(&self, url: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned,
    {
        self.execute(Request::delete(url)).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("retry_policy", &self.inner.retry_policy)
            .field("circuit_breaker", &self.inner.circuit_breaker)
            .field("default_headers", &self.inner.default_headers)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use breakwater::{CircuitBreaker, CircuitBreakerConfig, ClientBuilder, RetryPolicy};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), breakwater::Error> {
/// // One breaker shared by two clients pools what they learn about each host
/// let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
///
/// let weather = ClientBuilder::new()
///     .circuit_breaker(breaker.clone())
///     .retry_policy(RetryPolicy::default().with_jitter(true))
///     .timeout(Duration::from_secs(10))
///     .default_header("User-Agent", "weather-app/1.0")?
///     .build()?;
///
/// let geocoding = ClientBuilder::new().circuit_breaker(breaker).build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    retry_policy: RetryPolicy,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            transport: None,
            retry_policy: RetryPolicy::default(),
            circuit_breaker: None,
            default_headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Replaces the default reqwest-backed transport.
    ///
    /// When a custom transport is set, [`timeout`](Self::timeout) is ignored.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replaces the transport with a shared instance.
    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the retry policy for transport failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Uses the given circuit breaker instead of a fresh one.
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::InvalidRequest(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::InvalidRequest(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-attempt timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] prefixed with
    /// [`CLIENT_CONSTRUCTION_FAILED`](crate::CLIENT_CONSTRUCTION_FAILED)
    /// if the default transport cannot be constructed. A builder given its own
    /// transport never fails.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let mut transport = ReqwestTransport::new()?;
                if let Some(timeout) = self.timeout {
                    transport = transport.with_timeout(timeout);
                }
                Arc::new(transport)
            }
        };

        let circuit_breaker = self
            .circuit_breaker
            .unwrap_or_else(|| Arc::new(CircuitBreaker::default()));

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                retry_policy: self.retry_policy,
                circuit_breaker,
                default_headers: self.default_headers,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
