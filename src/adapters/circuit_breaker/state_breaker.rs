//! In-process circuit breaker.
//!
//! Each breaker guards its counters with its own mutex, so breakers for
//! different dependencies never contend. Listener callbacks run after the
//! lock is released.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::adapters::clock::SystemClock;
use crate::domain::foundation::StateMachine;
use crate::ports::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitEventListener,
    CircuitState, Clock, NoOpCircuitListener,
};

/// Circuit breaker whose state lives in process memory.
pub struct StateCircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    listener: Arc<dyn CircuitEventListener>,
    inner: Mutex<BreakerState>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_in_flight: u32,
    /// When the most recent half-open permit was handed out.
    last_permit_at: Instant,
    last_state_change: Instant,
    /// Recent outcomes for the failure-rate trip, `true` = failure.
    recent: VecDeque<bool>,
    total_successes: u64,
    total_failures: u64,
    times_opened: u64,
    rejected_calls: u64,
}

type Transition = Option<(CircuitState, CircuitState)>;

impl StateCircuitBreaker {
    /// Creates a breaker on the system clock with no listener.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_parts(
            name,
            config,
            Arc::new(SystemClock),
            Arc::new(NoOpCircuitListener),
        )
    }

    pub fn with_parts(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        listener: Arc<dyn CircuitEventListener>,
    ) -> Self {
        let now = clock.now();
        Self {
            name: name.into(),
            config,
            clock,
            listener,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_in_flight: 0,
                last_permit_at: now,
                last_state_change: now,
                recent: VecDeque::new(),
                total_successes: 0,
                total_failures: 0,
                times_opened: 0,
                rejected_calls: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, transition: Transition) {
        if let Some((from, to)) = transition {
            self.listener.on_state_change(&self.name, from, to);
        }
    }

    /// Moves along a defined edge and applies the entry rules of `target`.
    fn transition(&self, inner: &mut BreakerState, target: CircuitState) -> Transition {
        let from = inner.state;
        inner.state = from.advance_to(target);
        self.enter(inner, target);
        Some((from, target))
    }

    fn enter(&self, inner: &mut BreakerState, target: CircuitState) {
        inner.last_state_change = self.clock.now();
        inner.half_open_in_flight = 0;
        inner.success_count = 0;
        match target {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.recent.clear();
                tracing::info!(breaker = %self.name, "Circuit closed");
            }
            CircuitState::Open => {
                inner.times_opened += 1;
                tracing::warn!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    open_timeout_ms = self.config.open_timeout.as_millis() as u64,
                    "Circuit opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.name, "Circuit half-open, admitting trial calls");
            }
        }
    }

    fn push_outcome(&self, inner: &mut BreakerState, failed: bool) {
        if self.config.failure_rate_threshold.is_none() {
            return;
        }
        let window = self.config.rolling_window.max(1) as usize;
        inner.recent.push_back(failed);
        while inner.recent.len() > window {
            inner.recent.pop_front();
        }
    }

    fn failure_rate_tripped(&self, inner: &BreakerState) -> bool {
        let Some(threshold) = self.config.failure_rate_threshold else {
            return false;
        };
        let window = self.config.rolling_window.max(1) as usize;
        if inner.recent.len() < window {
            return false;
        }
        let failures = inner.recent.iter().filter(|failed| **failed).count();
        failures as f64 / inner.recent.len() as f64 >= threshold
    }
}

impl CircuitBreaker for StateCircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        self.lock().state
    }

    fn can_execute(&self) -> bool {
        let mut inner = self.lock();
        let (allowed, transition) = match inner.state {
            CircuitState::Closed => (true, None),
            CircuitState::Open => {
                let waited = self
                    .clock
                    .now()
                    .saturating_duration_since(inner.last_state_change);
                if waited >= self.config.open_timeout {
                    let transition = self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_in_flight = 1;
                    inner.last_permit_at = inner.last_state_change;
                    (true, transition)
                } else {
                    (false, None)
                }
            }
            CircuitState::HalfOpen => {
                let now = self.clock.now();
                if inner.half_open_in_flight >= self.config.half_open_max_requests
                    && now.saturating_duration_since(inner.last_permit_at)
                        >= self.config.open_timeout
                {
                    // Trials that never reported back hold their permits forever.
                    tracing::warn!(
                        breaker = %self.name,
                        stale_permits = inner.half_open_in_flight,
                        "Reclaiming half-open permits with no recorded outcome"
                    );
                    inner.half_open_in_flight = 0;
                }
                if inner.half_open_in_flight < self.config.half_open_max_requests {
                    inner.half_open_in_flight += 1;
                    inner.last_permit_at = now;
                    (true, None)
                } else {
                    (false, None)
                }
            }
        };
        if !allowed {
            inner.rejected_calls += 1;
        }
        drop(inner);

        self.notify(transition);
        allowed
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_successes += 1;
        let transition = match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                self.push_outcome(&mut inner, false);
                None
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed)
                } else {
                    None
                }
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => None,
        };
        drop(inner);

        self.notify(transition);
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.total_failures += 1;
        let transition = match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                self.push_outcome(&mut inner, true);
                if inner.failure_count >= self.config.failure_threshold
                    || self.failure_rate_tripped(&inner)
                {
                    self.transition(&mut inner, CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Open => None,
        };
        drop(inner);

        self.notify(transition);
    }

    fn record_ignored(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn reset(&self) {
        let mut inner = self.lock();
        let from = inner.state;
        // Administrative override: not a state machine edge.
        inner.state = CircuitState::Closed;
        self.enter(&mut inner, CircuitState::Closed);
        drop(inner);

        if from != CircuitState::Closed {
            self.notify(Some((from, CircuitState::Closed)));
        }
    }

    fn force_open(&self) {
        let mut inner = self.lock();
        let from = inner.state;
        inner.state = CircuitState::Open;
        self.enter(&mut inner, CircuitState::Open);
        drop(inner);

        if from != CircuitState::Open {
            self.notify(Some((from, CircuitState::Open)));
        }
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.lock();
        let time_until_half_open = (inner.state == CircuitState::Open).then(|| {
            let waited = self
                .clock
                .now()
                .saturating_duration_since(inner.last_state_change);
            self.config.open_timeout.saturating_sub(waited)
        });
        CircuitBreakerMetrics {
            state: inner.state,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            times_opened: inner.times_opened,
            rejected_calls: inner.rejected_calls,
            current_failures: inner.failure_count,
            current_successes: inner.success_count,
            half_open_in_flight: inner.half_open_in_flight,
            time_until_half_open,
        }
    }
}

impl std::fmt::Debug for StateCircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
