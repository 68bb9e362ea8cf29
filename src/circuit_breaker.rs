//! Error-percentage circuit breaker.
//!
//! The breaker tracks request outcomes over a rolling stats window and opens
//! once the error rate crosses the configured threshold at sufficient volume.
//! After a sleep window a single probe is admitted; its outcome decides
//! whether the circuit closes again or stays open.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Circuit is half-open, a single probe request is allowed.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Error percentage at which the circuit opens.
    pub error_percent_threshold: u32,
    /// Minimum request volume in the stats window before the threshold applies.
    pub request_volume_threshold: u32,
    /// Time to wait after opening before admitting a probe.
    pub sleep_window: Duration,
    /// Rolling window over which outcomes are counted.
    pub stats_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_percent_threshold: 25,
            request_volume_threshold: 20,
            sleep_window: Duration::from_secs(5),
            stats_window: Duration::from_secs(10),
        }
    }
}

/// Error-percentage circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: RwLock<CircuitState>,
    window_start: RwLock<Instant>,
    request_count: AtomicU32,
    failure_count: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
    probe_in_flight: AtomicBool,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            window_start: RwLock::new(Instant::now()),
            request_count: AtomicU32::new(0),
            failure_count: AtomicU32::new(0),
            opened_at: RwLock::new(None),
            probe_in_flight: AtomicBool::new(false),
        }
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        self.maybe_transition_to_half_open();
        *self.state.read()
    }

    /// Check whether a request may proceed.
    pub fn is_allowed(&self) -> bool {
        self.maybe_transition_to_half_open();

        let state = *self.state.read();
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                // Only one probe at a time
                self.probe_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            }
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let state = *self.state.read();
        match state {
            CircuitState::Closed => {
                self.roll_window_if_expired();
                self.request_count.fetch_add(1, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                debug!("probe succeeded, closing circuit");
                self.close();
            }
            CircuitState::Open => {
                debug!("success recorded while circuit open, ignoring");
            }
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        let state = *self.state.read();
        match state {
            CircuitState::Closed => {
                self.roll_window_if_expired();
                let requests = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if requests >= self.config.request_volume_threshold
                    && failures * 100 >= self.config.error_percent_threshold * requests
                {
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed, back to open for another sleep window
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    /// Release a probe reservation taken by [`is_allowed`](Self::is_allowed)
    /// when the guarded call was never made, so the next caller can probe.
    pub fn release_probe(&self) {
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    /// Reset the circuit breaker to the closed state.
    pub fn reset(&self) {
        self.close();
    }

    /// Requests counted in the current stats window.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Failures counted in the current stats window.
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn open(&self) {
        let mut state = self.state.write();
        if *state != CircuitState::Open {
            warn!("circuit breaker opening");
            *state = CircuitState::Open;
            *self.opened_at.write() = Some(Instant::now());
            self.probe_in_flight.store(false, Ordering::SeqCst);
        }
    }

    fn close(&self) {
        let mut state = self.state.write();
        if *state != CircuitState::Closed {
            info!("circuit breaker closing");
            *state = CircuitState::Closed;
            *self.opened_at.write() = None;
            self.request_count.store(0, Ordering::SeqCst);
            self.failure_count.store(0, Ordering::SeqCst);
            *self.window_start.write() = Instant::now();
            self.probe_in_flight.store(false, Ordering::SeqCst);
        }
    }

    fn roll_window_if_expired(&self) {
        let expired = self.window_start.read().elapsed() > self.config.stats_window;
        if expired {
            let mut window_start = self.window_start.write();
            if window_start.elapsed() > self.config.stats_window {
                *window_start = Instant::now();
                self.request_count.store(0, Ordering::SeqCst);
                self.failure_count.store(0, Ordering::SeqCst);
            }
        }
    }

    fn maybe_transition_to_half_open(&self) {
        let state = *self.state.read();
        if state != CircuitState::Open {
            return;
        }

        let opened_at = *self.opened_at.read();
        if let Some(opened) = opened_at {
            if opened.elapsed() >= self.config.sleep_window {
                let mut state = self.state.write();
                if *state == CircuitState::Open {
                    debug!("circuit breaker transitioning to half-open");
                    *state = CircuitState::HalfOpen;
                    self.probe_in_flight.store(false, Ordering::SeqCst);
                }
            }
        }
    }
}
