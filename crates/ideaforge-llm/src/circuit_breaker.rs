//! Three-state circuit breaker guarding the LLM providers.
//!
//! The breaker is an owned value shared through an `Arc`, so every run in a
//! process sees the same state while tests can build isolated instances.
//!
//! ```text
//! Closed --(threshold consecutive failures)--> Open
//! Open   --(cooldown elapsed, one probe)-----> HalfOpen
//! HalfOpen --success--> Closed
//! HalfOpen --failure--> Open
//! ```

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    // Poisoning is ignored; the state is plain data.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Ask to make a call now.
    ///
    /// # Errors
    ///
    /// Returns the time left until a call may be attempted when the circuit
    /// is open, or when a half-open probe is already in flight.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, Duration> {
        self.try_acquire_at(Instant::now())
    }

    /// [`Self::try_acquire`] at an explicit instant.
    ///
    /// # Errors
    ///
    /// See [`Self::try_acquire`].
    pub fn try_acquire_at(&self, now: Instant) -> Result<BreakerPermit<'_>, Duration> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self, false)),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map_or(self.cooldown, |at| now.saturating_duration_since(at));
                if elapsed < self.cooldown {
                    return Err(self.cooldown - elapsed);
                }
                info!("Circuit cooldown elapsed, allowing one probe call");
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                Ok(BreakerPermit::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(Duration::ZERO)
                } else {
                    inner.probe_in_flight = true;
                    Ok(BreakerPermit::new(self, true))
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!("Circuit closed after successful call");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
    }

    fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(now);
        inner.probe_in_flight = false;

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.threshold;
        if should_open && inner.state != CircuitState::Open {
            warn!(
                failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit opened"
            );
            inner.state = CircuitState::Open;
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }
}

/// Permission for one logical call. Settle it with [`Self::succeed`] or
/// [`Self::fail`]; dropping it unsettled frees a half-open probe slot
/// without changing the counters.
#[derive(Debug)]
#[must_use]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    /// Whether this permit is the single half-open probe.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(self) {
        self.fail_at(Instant::now());
    }

    pub fn fail_at(mut self, now: Instant) {
        self.settled = true;
        self.breaker.record_failure_at(now);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}
