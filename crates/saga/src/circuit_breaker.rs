//! Circuit breaker guarding calls to the inventory authority.
//!
//! # States
//!
//! - **Closed**: calls pass through. Outcomes are kept in a rolling window of
//!   the last `window_size` calls.
//! - **Open**: calls are rejected without reaching the authority until
//!   `open_duration` has elapsed.
//! - **HalfOpen**: at most `half_open_probes` trial calls are admitted. Their
//!   failure rate decides between Closed and Open.
//!
//! Only outcomes the caller classifies as failures count against the
//! authority; a business refusal is a healthy answer. A call dropped before
//! it completes is ignored when Closed and counts as a failed trial call when
//! HalfOpen.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure ratio (0.0 to 1.0) at or above which the circuit opens.
    pub failure_rate_threshold: f64,
    /// Number of most recent calls considered in Closed state.
    pub window_size: usize,
    /// Calls required in the window before the rate is evaluated.
    pub minimum_calls: usize,
    /// How long the circuit stays Open before admitting trial calls.
    pub open_duration: Duration,
    /// Trial calls admitted in HalfOpen state.
    pub half_open_probes: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            window_size: 10,
            minimum_calls: 5,
            open_duration: Duration::from_secs(30),
            half_open_probes: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    #[must_use]
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.config.failure_rate_threshold = rate.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size.max(1);
        self
    }

    #[must_use]
    pub fn minimum_calls(mut self, calls: usize) -> Self {
        self.config.minimum_calls = calls.max(1);
        self
    }

    #[must_use]
    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    #[must_use]
    pub fn half_open_probes(mut self, probes: usize) -> Self {
        self.config.half_open_probes = probes.max(1);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        self.config
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from circuit breaker operations.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// The call was not attempted.
    #[error("Circuit breaker is open")]
    Open,
    /// The call was attempted and failed.
    #[error("Operation failed: {0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: State,
    /// Bumped on every transition; results from an earlier state are stale.
    generation: u64,
    /// `true` marks a failed call. Oldest first.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_admitted: usize,
    trial_failures: usize,
    trial_results: usize,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: State::Closed,
            generation: 0,
            window: VecDeque::new(),
            opened_at: None,
            trials_admitted: 0,
            trial_failures: 0,
            trial_results: 0,
        }
    }
}

/// How an admitted call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    /// The caller dropped the call before it completed.
    Abandoned,
}

/// Records the outcome of an admitted call exactly once, even if the call
/// future is dropped mid-flight.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Admission<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.generation, outcome);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(breaker = self.breaker.name, "admitted call abandoned");
            self.breaker.record(self.generation, Outcome::Abandoned);
        }
    }
}

/// Snapshot of the breaker's lifetime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

/// Failure-rate circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
    total_calls: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    /// Create a closed breaker. `name` labels its log lines and metrics.
    #[must_use]
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState::closed())),
            total_calls: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current state. An expired Open state reports Open until the next call.
    pub async fn state(&self) -> State {
        self.lock().state
    }

    /// Call `operation` through the breaker.
    ///
    /// `is_failure` decides which errors count against the remote side;
    /// errors it rejects are recorded as successful calls.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` if the call was not admitted.
    /// Returns `CircuitBreakerError::Inner` if the operation fails.
    pub async fn call<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let Some(admission) = self.try_acquire() else {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.name)
                .increment(1);
            tracing::warn!(breaker = self.name, "circuit breaker is open, rejecting call");
            return Err(CircuitBreakerError::Open);
        };

        match operation().await {
            Ok(value) => {
                admission.settle(Outcome::Success);
                Ok(value)
            }
            Err(err) => {
                let failed = is_failure(&err);
                if failed {
                    self.total_failures.fetch_add(1, Ordering::Relaxed);
                    admission.settle(Outcome::Failure);
                } else {
                    admission.settle(Outcome::Success);
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> Option<Admission<'_>> {
        let mut state = self.lock();

        let admitted = match state.state {
            State::Closed => true,
            State::Open => {
                let expired = state
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.open_duration);
                if expired {
                    self.transition(&mut state, State::HalfOpen);
                    state.trials_admitted = 1;
                }
                expired
            }
            State::HalfOpen => {
                if state.trials_admitted < self.config.half_open_probes {
                    state.trials_admitted += 1;
                    true
                } else {
                    false
                }
            }
        };

        admitted.then(|| Admission {
            breaker: self,
            generation: state.generation,
            settled: false,
        })
    }

    fn record(&self, generation: u64, outcome: Outcome) {
        let mut state = self.lock();
        // Late result of a call admitted before the last transition.
        if state.generation != generation {
            return;
        }

        match state.state {
            State::Closed => {
                // An abandoned call says nothing about the authority.
                if outcome == Outcome::Abandoned {
                    return;
                }
                state.window.push_back(outcome == Outcome::Failure);
                while state.window.len() > self.config.window_size {
                    state.window.pop_front();
                }

                if state.window.len() >= self.config.minimum_calls {
                    let failures = state.window.iter().filter(|f| **f).count();
                    let rate = failures as f64 / state.window.len() as f64;
                    if rate >= self.config.failure_rate_threshold {
                        tracing::warn!(
                            breaker = self.name,
                            failure_rate = rate,
                            threshold = self.config.failure_rate_threshold,
                            "failure rate over threshold"
                        );
                        self.transition(&mut state, State::Open);
                    }
                }
            }
            State::HalfOpen => {
                // An abandoned trial call counts as failed so the trial budget
                // always drains.
                state.trial_results += 1;
                if outcome != Outcome::Success {
                    state.trial_failures += 1;
                }

                if state.trial_results >= self.config.half_open_probes {
                    let rate = state.trial_failures as f64 / state.trial_results as f64;
                    if rate >= self.config.failure_rate_threshold {
                        self.transition(&mut state, State::Open);
                    } else {
                        self.transition(&mut state, State::Closed);
                    }
                }
            }
            State::Open => {}
        }
    }

    fn transition(&self, state: &mut BreakerState, to: State) {
        let from = state.state;
        tracing::info!(breaker = self.name, %from, %to, "circuit breaker transition");
        metrics::counter!(
            "circuit_breaker_state_transitions_total",
            "breaker" => self.name,
            "to" => to.as_str()
        )
        .increment(1);

        let generation = state.generation + 1;
        *state = BreakerState::closed();
        state.state = to;
        state.generation = generation;
        if to == State::Open {
            state.opened_at = Some(Instant::now());
        }
    }

    /// Lifetime counters of this breaker.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Force the breaker back to Closed with an empty window.
    pub async fn reset(&self) {
        let mut state = self.lock();
        tracing::info!(breaker = self.name, "circuit breaker manually reset");
        let generation = state.generation + 1;
        *state = BreakerState::closed();
        state.generation = generation;
    }
}
