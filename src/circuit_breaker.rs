//! Circuit breaker shared by every call made through one client.
//!
//! # States
//! - Closed: requests flow; outcomes are counted in a fixed window.
//! - Open: requests fail fast with [`Error::CircuitOpen`](crate::Error::CircuitOpen).
//! - HalfOpen: a few probe requests are let through.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     requests >= min_requests and failures/requests >= failure_ratio
//! Open     → HalfOpen: open_timeout elapsed
//! HalfOpen → Closed:   half_open_max_requests consecutive probe successes
//! HalfOpen → Open:     any probe failure
//! ```
//!
//! Every physical HTTP attempt takes one [`Permit`] and reports exactly one
//! outcome through it. A permit dropped without an outcome (the caller gave
//! up) is released without counting.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing fast.
    Open,
    /// Probing for recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

/// Breaker tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Length of the counting window while closed. Zero never resets counts.
    pub interval: Duration,
    /// How long the breaker stays open before probing.
    pub open_timeout: Duration,
    /// Probes admitted while half-open, and successes needed to close.
    pub half_open_max_requests: u32,
    /// Requests in the window below which the breaker never trips.
    pub min_requests: u32,
    /// Failure ratio at or above which the breaker trips.
    pub failure_ratio: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
            min_requests: 3,
            failure_ratio: 0.6,
        }
    }
}

/// Counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Attempts admitted.
    pub requests: u32,
    /// Successful outcomes.
    pub total_successes: u32,
    /// Failed outcomes.
    pub total_failures: u32,
    /// Successes since the last failure.
    pub consecutive_successes: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }
}

type StateListener = Box<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

struct Shared {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
    in_flight: u32,
}

struct Inner {
    config: CircuitBreakerConfig,
    shared: Mutex<Shared>,
    listener: Option<StateListener>,
}

/// The breaker. Cloning shares the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

/// Rejection returned while the breaker is open or half-open and full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// State at the time of rejection.
    pub state: CircuitState,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a closed breaker that calls `listener(from, to)` on every
    /// transition. The listener runs outside the breaker's lock.
    pub fn with_listener<F>(config: CircuitBreakerConfig, listener: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        Self::build(config, Some(Box::new(listener)))
    }

    fn build(config: CircuitBreakerConfig, listener: Option<StateListener>) -> Self {
        let now = Instant::now();
        let expiry = window_end(&config, now);
        Self {
            inner: Arc::new(Inner {
                config,
                shared: Mutex::new(Shared {
                    state: CircuitState::Closed,
                    generation: 0,
                    counts: Counts::default(),
                    expiry,
                    in_flight: 0,
                }),
                listener,
            }),
        }
    }

    /// Current state, after applying any due time-based transition.
    pub fn state(&self) -> CircuitState {
        let (state, transition) = {
            let mut shared = self.lock();
            let transition = self.refresh(&mut shared, Instant::now());
            (shared.state, transition)
        };
        self.notify(transition);
        state
    }

    /// Counters of the current generation.
    pub fn counts(&self) -> Counts {
        self.lock().counts
    }

    /// Admits one attempt or rejects it.
    pub fn try_acquire(&self) -> Result<Permit, Rejected> {
        let (result, transition) = {
            let mut shared = self.lock();
            let transition = self.refresh(&mut shared, Instant::now());

            let result = match shared.state {
                CircuitState::Open => Err(Rejected {
                    state: CircuitState::Open,
                }),
                CircuitState::HalfOpen
                    if shared.in_flight >= self.inner.config.half_open_max_requests =>
                {
                    Err(Rejected {
                        state: CircuitState::HalfOpen,
                    })
                }
                _ => {
                    shared.counts.requests += 1;
                    shared.in_flight += 1;
                    Ok(Permit {
                        breaker: self.clone(),
                        generation: shared.generation,
                        settled: false,
                    })
                }
            };
            (result, transition)
        };
        self.notify(transition);
        result
    }

    fn settle(&self, generation: u64, outcome: Option<bool>) {
        let transition = {
            let mut shared = self.lock();
            let now = Instant::now();
            let mut transition = self.refresh(&mut shared, now);

            if shared.generation == generation {
                shared.in_flight = shared.in_flight.saturating_sub(1);
                match outcome {
                    Some(true) => {
                        shared.counts.on_success();
                        if shared.state == CircuitState::HalfOpen
                            && shared.counts.consecutive_successes
                                >= self.inner.config.half_open_max_requests
                        {
                            transition = self.set_state(&mut shared, CircuitState::Closed, now);
                        }
                    }
                    Some(false) => {
                        shared.counts.on_failure();
                        let trip = match shared.state {
                            CircuitState::Closed => self.ready_to_trip(&shared.counts),
                            CircuitState::HalfOpen => true,
                            CircuitState::Open => false,
                        };
                        if trip {
                            transition = self.set_state(&mut shared, CircuitState::Open, now);
                        }
                    }
                    None => {
                        shared.counts.requests = shared.counts.requests.saturating_sub(1);
                    }
                }
            }
            transition
        };
        self.notify(transition);
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        let config = &self.inner.config;
        // Guards the division below as well as cold-start noise.
        if counts.requests == 0 || counts.requests < config.min_requests {
            return false;
        }
        f64::from(counts.total_failures) / f64::from(counts.requests) >= config.failure_ratio
    }

    /// Applies time-based transitions: window reset while closed, and
    /// open → half-open once the timeout has passed.
    fn refresh(&self, shared: &mut Shared, now: Instant) -> Option<(CircuitState, CircuitState)> {
        let expired = shared.expiry.is_some_and(|expiry| expiry <= now);
        match shared.state {
            CircuitState::Closed if expired => {
                self.new_generation(shared, now);
                None
            }
            CircuitState::Open if expired => {
                self.set_state(shared, CircuitState::HalfOpen, now)
            }
            _ => None,
        }
    }

    fn set_state(
        &self,
        shared: &mut Shared,
        to: CircuitState,
        now: Instant,
    ) -> Option<(CircuitState, CircuitState)> {
        let from = shared.state;
        if from == to {
            return None;
        }
        shared.state = to;
        self.new_generation(shared, now);
        Some((from, to))
    }

    fn new_generation(&self, shared: &mut Shared, now: Instant) {
        shared.generation += 1;
        shared.counts = Counts::default();
        shared.in_flight = 0;
        shared.expiry = match shared.state {
            CircuitState::Closed => window_end(&self.inner.config, now),
            CircuitState::Open => Some(now + self.inner.config.open_timeout),
            CircuitState::HalfOpen => None,
        };
    }

    fn notify(&self, transition: Option<(CircuitState, CircuitState)>) {
        if let (Some((from, to)), Some(listener)) = (transition, &self.inner.listener) {
            listener(from, to);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn window_end(config: &CircuitBreakerConfig, now: Instant) -> Option<Instant> {
    (!config.interval.is_zero()).then(|| now + config.interval)
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("CircuitBreaker")
            .field("state", &shared.state)
            .field("counts", &shared.counts)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Admission for a single attempt.
///
/// Report the outcome with [`Permit::success`] or [`Permit::failure`].
#[must_use = "a permit must report the outcome of its attempt"]
pub struct Permit {
    breaker: CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit {
    /// The attempt reached a healthy API.
    pub fn success(self) {
        self.record(true);
    }

    /// The attempt failed in a way that reflects API or network health.
    pub fn failure(self) {
        self.record(false);
    }

    /// Reports `success` or failure.
    pub fn record(mut self, success: bool) {
        self.settled = true;
        self.breaker.settle(self.generation, Some(success));
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, None);
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("generation", &self.generation)
            .finish()
    }
}
