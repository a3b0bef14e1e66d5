//! Per-endpoint circuit breaker.
//!
//! Each endpoint moves independently through three states:
//!
//! - **Closed**: normal operation, every request is admitted
//! - **Open**: the endpoint is failing, requests are rejected without I/O
//! - **HalfOpen**: the cooldown elapsed, requests probe for recovery
//!
//! ```text
//! Closed ──(consecutive failures >= threshold)──▶ Open
//! Open ──(reset timeout elapsed since last failure)──▶ HalfOpen
//! HalfOpen ──(success)──▶ Closed
//! HalfOpen ──(failure)──▶ Open
//! ```
//!
//! All endpoint states live in one map behind a single lock. Critical sections
//! are arithmetic only; log events are emitted after the lock is released.
//!
//! Entries are created on first contact and never evicted, so the map grows
//! by one entry per distinct host. [`CircuitBreaker::tracked_endpoints`]
//! reports its size.

use crate::request::Endpoint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of consecutive failures that opens a circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cooldown before an open circuit admits a probe.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of monotonic time for the breaker.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use breakwater::circuit_breaker::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(61));
/// assert_eq!(clock.now() - start, Duration::from_secs(61));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Thresholds governing every endpoint of a breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long after the last failure an open circuit admits a probe.
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Creates a configuration. `failure_threshold` is clamped to at least 1.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }
}

/// Circuit state of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Normal operation, requests flow through.
    #[default]
    Closed,
    /// Endpoint is failing, requests are rejected.
    Open,
    /// Cooldown elapsed, requests probe for recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(label)
    }
}

/// Snapshot of one endpoint's breaker bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointState {
    /// Current circuit state.
    pub state: CircuitState,
    /// Failures recorded since the last success.
    pub consecutive_failures: u32,
    /// When the most recent failure was recorded.
    pub last_failure: Option<Instant>,
}

/// Rejection returned by [`CircuitBreaker::should_allow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitOpen {
    /// The rejected endpoint.
    pub endpoint: Endpoint,
    /// When the endpoint will admit a recovery probe, or `None` if the
    /// cooldown runs past the range of `Instant`.
    pub reset_at: Option<Instant>,
}

impl From<CircuitOpen> for crate::Error {
    fn from(open: CircuitOpen) -> Self {
        crate::Error::CircuitBreakerOpen {
            endpoint: open.endpoint,
            reset_at: open.reset_at,
        }
    }
}

/// Circuit breaker tracking every endpoint a client talks to.
///
/// Share one instance between clients with an `Arc` to pool health knowledge;
/// construct a fresh one to isolate it.
///
/// # Examples
///
/// ```
/// use breakwater::circuit_breaker::{CircuitBreaker, CircuitState};
/// use breakwater::Endpoint;
///
/// let breaker = CircuitBreaker::default();
/// let endpoint = Endpoint::new("api.example.com");
///
/// for _ in 0..5 {
///     breaker.record_failure(&endpoint);
/// }
///
/// assert_eq!(breaker.state(&endpoint), CircuitState::Open);
/// assert!(breaker.should_allow(&endpoint).is_err());
///
/// // Other endpoints are unaffected
/// assert!(breaker.should_allow(&Endpoint::new("cdn.example.com")).is_ok());
/// ```
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    endpoints: Mutex<HashMap<Endpoint, EndpointState>>,
}

impl CircuitBreaker {
    /// Creates a breaker driven by the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a breaker driven by the given clock.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker's configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Decides whether a request to `endpoint` may proceed.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and admits
    /// the request as a recovery probe. Every request arriving while half-open
    /// is admitted as well.
    pub fn should_allow(&self, endpoint: &Endpoint) -> Result<(), CircuitOpen> {
        let now = self.clock.now();
        let reset_timeout = self.config.reset_timeout;

        let decision = {
            let mut endpoints = self.endpoints.lock();
            let entry = endpoints.entry(endpoint.clone()).or_default();
            match entry.state {
                CircuitState::Closed | CircuitState::HalfOpen => Admission::Allowed,
                CircuitState::Open => match entry.last_failure {
                    Some(last_failure)
                        if now.saturating_duration_since(last_failure) < reset_timeout =>
                    {
                        Admission::Rejected(last_failure.checked_add(reset_timeout))
                    }
                    _ => {
                        entry.state = CircuitState::HalfOpen;
                        Admission::Probe
                    }
                },
            }
        };

        match decision {
            Admission::Allowed => Ok(()),
            Admission::Probe => {
                tracing::info!(endpoint = %endpoint, "Circuit half-open, admitting recovery probe");
                Ok(())
            }
            Admission::Rejected(reset_at) => {
                tracing::debug!(
                    endpoint = %endpoint,
                    retry_after_ms = reset_at.map(|at| at.saturating_duration_since(now).as_millis()),
                    "Circuit open, rejecting request"
                );
                Err(CircuitOpen {
                    endpoint: endpoint.clone(),
                    reset_at,
                })
            }
        }
    }

    /// Records a success, closing the circuit and clearing the failure count.
    pub fn record_success(&self, endpoint: &Endpoint) {
        let previous = {
            let mut endpoints = self.endpoints.lock();
            let entry = endpoints.entry(endpoint.clone()).or_default();
            let previous = entry.state;
            *entry = EndpointState::default();
            previous
        };

        if previous != CircuitState::Closed {
            tracing::info!(endpoint = %endpoint, from = %previous, "Circuit closed");
        }
    }

    /// Records a failure, opening the circuit once the threshold is reached.
    ///
    /// A failure while half-open re-opens the circuit immediately, since the
    /// failure count was never reset.
    pub fn record_failure(&self, endpoint: &Endpoint) {
        let now = self.clock.now();
        let threshold = self.config.failure_threshold;

        let (previous, failures) = {
            let mut endpoints = self.endpoints.lock();
            let entry = endpoints.entry(endpoint.clone()).or_default();
            let previous = entry.state;
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
            entry.last_failure = Some(now);
            if entry.consecutive_failures >= threshold {
                entry.state = CircuitState::Open;
            }
            (previous, entry.consecutive_failures)
        };

        if failures >= threshold && previous != CircuitState::Open {
            tracing::warn!(
                endpoint = %endpoint,
                from = %previous,
                consecutive_failures = failures,
                reset_timeout_secs = self.config.reset_timeout.as_secs(),
                "Circuit opened"
            );
        }
    }

    /// Returns the failures recorded since the endpoint's last success.
    ///
    /// Endpoints never seen report 0.
    pub fn consecutive_failures(&self, endpoint: &Endpoint) -> u32 {
        self.endpoint_state(endpoint).consecutive_failures
    }

    /// Returns the endpoint's stored state without attempting any transition.
    ///
    /// An open circuit whose cooldown has elapsed still reads as `Open` until
    /// the next [`should_allow`](Self::should_allow).
    pub fn state(&self, endpoint: &Endpoint) -> CircuitState {
        self.endpoint_state(endpoint).state
    }

    /// Returns a snapshot of the endpoint's bookkeeping.
    pub fn endpoint_state(&self, endpoint: &Endpoint) -> EndpointState {
        self.endpoints
            .lock()
            .get(endpoint)
            .copied()
            .unwrap_or_default()
    }

    /// Returns how many endpoints have been contacted.
    pub fn tracked_endpoints(&self) -> usize {
        self.endpoints.lock().len()
    }

    /// Forgets everything known about `endpoint`.
    pub fn reset(&self, endpoint: &Endpoint) {
        self.endpoints.lock().remove(endpoint);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("tracked_endpoints", &self.tracked_endpoints())
            .finish()
    }
}

enum Admission {
    Allowed,
    Probe,
    Rejected(Option<Instant>),
}
