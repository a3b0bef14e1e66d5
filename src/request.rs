//! Request types and endpoint derivation.

use crate::{Error, Result};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use url::Url;

/// The unit of circuit-breaker isolation: a URL's host, plus its port when
/// the port is not the scheme default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(String);

impl Endpoint {
    /// Creates an endpoint from an already-normalized authority string.
    pub fn new(authority: impl Into<String>) -> Self {
        Self(authority.into())
    }

    /// Derives the endpoint from a parsed URL.
    ///
    /// Returns `None` when the URL has no host (e.g. `mailto:` or `file:///`).
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str().filter(|host| !host.is_empty())?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Some(Self(authority))
    }

    /// Returns the endpoint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A request as built by the caller.
///
/// Nothing is validated until the request is executed; a malformed URL or a
/// missing host surfaces as [`Error::InvalidRequest`] at that point.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,

    /// The absolute target URL.
    pub url: String,

    /// Headers for this request, applied over the client's defaults.
    pub headers: HeaderMap,

    /// Query parameters appended to the URL.
    pub query_params: Vec<(String, String)>,

    /// The already-encoded request body.
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Creates a new `Request` with the given method and URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Creates a PATCH request.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::InvalidRequest(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::InvalidRequest(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Sets a pre-encoded body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `body` as JSON and sets `content-type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if serialization fails.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| Error::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(encoded);
        Ok(self)
    }

    /// Validates the request and resolves it into the form handed to a transport.
    ///
    /// `default_headers` are applied first so request headers take precedence.
    pub(crate) fn prepare(self, default_headers: &HeaderMap) -> Result<PreparedRequest> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidRequest(format!("Invalid URL {:?}: {}", self.url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidRequest(format!(
                "Unsupported URL scheme {:?}",
                url.scheme()
            )));
        }

        let endpoint = Endpoint::from_url(&url)
            .ok_or_else(|| Error::InvalidRequest(format!("URL {:?} has no host", self.url)))?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = default_headers.clone();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        Ok(PreparedRequest {
            method: self.method,
            url,
            endpoint,
            headers,
            body: self.body,
        })
    }
}

/// A validated request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// The HTTP method.
    pub method: Method,
    /// The fully resolved URL, query parameters included.
    pub url: Url,
    /// The endpoint derived from the URL.
    pub endpoint: Endpoint,
    /// Default headers merged with request headers.
    pub headers: HeaderMap,
    /// The encoded body, if any.
    pub body: Option<Vec<u8>>,
}
