//! Request-level retry with exponential backoff and jitter.
//!
//! [`RetryPolicy`] is a stateless decision function: given the state of one
//! request and the error it just hit, it says whether to try again and how
//! long to wait. [`fetch_with_retry`] applies it to a single backend call.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay(k) = min(base_delay * backoff_multiplier^k + uniform(0..=jitter), max_delay)
//! ```
//!
//! where `k` is the 0-indexed attempt that just failed.

use crate::error::{ExtractError, FetchError};
use crate::fetch::{Document, FetchBackend};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Backoff parameters applied to every network request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    /// Upper bound of the uniform random jitter added to each wait.
    #[serde(with = "millis")]
    pub jitter: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_multiplier: 1.5,
            jitter: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Bookkeeping for one request. Never shared between requests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// 0-indexed attempt currently in flight.
    pub attempt: u32,
    pub total_wait: Duration,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_wait(&mut self, delay: Duration) {
        self.attempt += 1;
        self.total_wait += delay;
    }
}

/// Whether an error is worth another attempt.
///
/// Timeouts, connection failures, 429, 403 and 5xx are; every other status
/// is permanent, and so are local failures like a bad URL.
pub fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Timeout | FetchError::Connect(_) => true,
        FetchError::Status(code) => matches!(code, 403 | 429 | 500..=599),
        FetchError::Body(_)
        | FetchError::InvalidUrl(_)
        | FetchError::BackendInit(_)
        | FetchError::Unsupported(_) => false,
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt`, no jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Wait including jitter, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.base_delay_for(attempt);
        if !self.jitter.is_zero() {
            let jitter_ms: u64 = rng().random_range(0..=self.jitter.as_millis() as u64);
            delay += Duration::from_millis(jitter_ms);
        }
        delay.min(self.max_delay)
    }

    pub fn decide(&self, state: &RetryState, err: &FetchError) -> RetryDecision {
        if !is_retryable(err) || state.attempt + 1 >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for(state.attempt))
    }

    /// Waits the policy would sleep if every attempt failed, without jitter.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|k| self.base_delay_for(k))
            .collect()
    }
}

/// Map a final transport failure to the per-source taxonomy.
pub fn exhausted(url: &str, attempts: u32, err: &FetchError) -> ExtractError {
    match err {
        FetchError::Status(status) if !is_retryable(err) => ExtractError::PermanentHttp {
            url: url.to_string(),
            status: *status,
        },
        FetchError::BackendInit(reason) | FetchError::Unsupported(reason) => {
            ExtractError::Configuration(reason.clone())
        }
        FetchError::Body(reason) | FetchError::InvalidUrl(reason) => ExtractError::Parse {
            url: url.to_string(),
            reason: reason.clone(),
        },
        _ => ExtractError::TransientNetwork {
            url: url.to_string(),
            attempts,
            reason: err.to_string(),
        },
    }
}

/// Fetch `url` through `backend`, retrying per `policy`.
#[instrument(level = "debug", skip_all, fields(%url, backend = %backend.kind()))]
pub async fn fetch_with_retry(
    policy: &RetryPolicy,
    backend: &mut dyn FetchBackend,
    url: &str,
) -> Result<Document, ExtractError> {
    let total_t0 = Instant::now();
    let mut state = RetryState::new();

    loop {
        let attempt_t0 = Instant::now();
        match backend.fetch(url).await {
            Ok(doc) => {
                if state.attempt > 0 {
                    debug!(attempts = state.attempt + 1, "Fetch succeeded after retry");
                }
                return Ok(doc);
            }
            Err(e) => match policy.decide(&state, &e) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        attempt = state.attempt + 1,
                        max = policy.max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Fetch attempt failed; backing off"
                    );
                    state.record_wait(delay);
                    sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    let attempts = state.attempt + 1;
                    error!(
                        attempts,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        waited_ms = state.total_wait.as_millis() as u64,
                        error = %e,
                        "Fetch gave up"
                    );
                    return Err(exhausted(url, attempts, &e));
                }
            },
        }
    }
}

/// Serde helper storing durations as integer milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
