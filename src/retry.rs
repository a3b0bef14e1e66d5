//! Retry policy for transient transport failures.
//!
//! A [`RetryPolicy`] is a pure decision object: given an attempt number it
//! computes the backoff delay, and given a failure it decides whether another
//! attempt is permitted. It holds no state and can be shared freely.

use crate::error::TransportError;
use rand::Rng;
use std::time::Duration;

/// Default number of transport invocations per request.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Bounded exponential backoff.
///
/// The delay after attempt `n` is `base_delay * 2^(n - 1)`, so the defaults
/// produce 1s, 2s, 4s.
///
/// # Examples
///
/// ```
/// use breakwater::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay(1), Duration::from_secs(1));
/// assert_eq!(policy.delay(2), Duration::from_secs(2));
/// assert_eq!(policy.delay(3), Duration::from_secs(4));
///
/// // Fast policy for tests
/// let fast = RetryPolicy::new(3, Duration::from_millis(10));
/// assert_eq!(fast.delay(3), Duration::from_millis(40));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Option<Duration>,
    jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` transport calls per request.
    ///
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: None,
            jitter: false,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Caps every computed delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Scales each delay by a random factor between 50% and 100%.
    ///
    /// Spreads retries from many clients that failed at the same instant.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the maximum number of transport calls per request.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Returns the delay used after the first failed attempt.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the delay to wait after the given attempt (1-indexed) fails.
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = 2u32.saturating_pow(exponent);
        let mut delay = self.base_delay.saturating_mul(multiplier);

        if let Some(max_delay) = self.max_delay {
            delay = delay.min(max_delay);
        }

        if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            scale(delay, jitter_factor)
        } else {
            delay
        }
    }

    /// Returns `true` if the failure of `attempt` should be followed by another.
    ///
    /// Only the transient transport kinds qualify. HTTP status and decode
    /// failures never reach this policy.
    pub fn should_retry(&self, error: &TransportError, attempt: usize) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}

/// Multiplies `delay` by `factor`, keeping `delay` when the product is not representable.
fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}
