use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{ProviderError, ProviderId};

/// Runtime circuit state for one provider's upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct Circuit {
    open_since: Option<Instant>,
    probing: bool,
    consecutive_failures: u32,
}

/// Circuit breaker shared by every call of one adapter.
///
/// Only outage-like failures count against the upstream (timeouts,
/// throttling, transport errors, 5xx). Any other answer, a 404 included,
/// proves it is reachable and resets the count.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            circuit: Mutex::new(Circuit::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a call, or fails fast while the circuit is open.
    ///
    /// Once `open_timeout` has elapsed a single probe is let through; its
    /// outcome closes or re-opens the circuit. A probe permit dropped
    /// without an outcome frees the slot for the next caller.
    pub fn check(&self) -> Result<CallPermit<'_>, ProviderError> {
        let mut circuit = self.lock();
        let Some(open_since) = circuit.open_since else {
            return Ok(CallPermit::new(self, false));
        };

        if !circuit.probing && open_since.elapsed() >= self.config.open_timeout {
            circuit.probing = true;
            return Ok(CallPermit::new(self, true));
        }

        Err(ProviderError::unavailable(format!(
            "{} circuit breaker is open; skipping upstream call",
            self.provider
        )))
    }

    pub fn record_success(&self) {
        let mut circuit = self.lock();
        if circuit.open_since.is_some() {
            info!(provider = %self.provider, "circuit closed after successful probe");
        }
        *circuit = Circuit::default();
    }

    pub fn record_failure(&self) {
        let mut circuit = self.lock();
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);

        let trips = circuit.probing || circuit.consecutive_failures >= self.config.failure_threshold;
        if trips {
            if circuit.open_since.is_none() || circuit.probing {
                warn!(
                    provider = %self.provider,
                    failures = circuit.consecutive_failures,
                    "circuit opened"
                );
            }
            circuit.open_since = Some(Instant::now());
            circuit.probing = false;
        }
    }

    fn release_probe(&self) {
        let mut circuit = self.lock();
        if circuit.probing {
            circuit.probing = false;
            debug!(provider = %self.provider, "probe abandoned; circuit stays open");
        }
    }

    pub fn state(&self) -> CircuitState {
        let circuit = self.lock();
        match (circuit.open_since, circuit.probing) {
            (None, _) => CircuitState::Closed,
            (Some(_), true) => CircuitState::HalfOpen,
            (Some(_), false) => CircuitState::Open,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }
}

/// Admission for one upstream call, settled with its outcome.
#[must_use = "settle the permit with the call outcome"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// The upstream answered, even if the answer was an error.
    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// The upstream looked down: timeout, throttling, transport error or 5xx.
    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}
