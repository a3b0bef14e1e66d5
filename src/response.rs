//! Decoded responses with execution metadata.

use crate::request::Endpoint;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successfully decoded response together with how it was obtained.
///
/// # Examples
///
/// ```no_run
/// use breakwater::{Client, Request};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Forecast {
///     summary: String,
/// }
///
/// # async fn example() -> Result<(), breakwater::Error> {
/// let client = Client::builder().build()?;
/// let response = client
///     .send::<Forecast>(Request::get("https://api.example.com/forecast"))
///     .await?;
///
/// println!("{} (from {})", response.summary, response.endpoint);
/// if response.was_retried() {
///     println!("needed {} attempts over {:?}", response.attempts, response.latency);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response body.
    pub data: T,

    /// The raw response body, lossily converted to UTF-8.
    pub raw_body: String,

    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The endpoint that served the response.
    pub endpoint: Endpoint,

    /// Time from the first attempt until the response was received,
    /// backoff sleeps included.
    pub latency: Duration,

    /// Transport invocations needed, 1 when no retry happened.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Maps the decoded data while keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use breakwater::{Endpoint, Response};
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response {
    ///     data: 21.5_f32,
    ///     raw_body: "21.5".to_string(),
    ///     status: StatusCode::OK,
    ///     headers: HeaderMap::new(),
    ///     endpoint: Endpoint::new("api.example.com"),
    ///     latency: Duration::from_millis(40),
    ///     attempts: 1,
    /// };
    ///
    /// let rounded = response.map(|celsius| celsius.round() as i32);
    /// assert_eq!(rounded.data, 22);
    /// assert_eq!(rounded.endpoint.as_str(), "api.example.com");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            endpoint: self.endpoint,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Discards the metadata.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
