//! Resilient command: circuit breaker plus bounded concurrency around a
//! plain command.

use crate::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::command::HttpCommand;
use crate::descriptor::Api;
use crate::error::{ErrorCode, GoxHttpError};
use crate::request::GoxRequest;
use crate::response::GoxResponse;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Per-API breaker overrides, passed into context construction.
///
/// Replaces the process-wide override table the original design used for
/// deterministic breaker testing; an empty table leaves every API on its
/// computed timeout and the default thresholds.
#[derive(Debug, Clone, Default)]
pub struct BreakerOverrides {
    overrides: HashMap<String, BreakerOverride>,
}

#[derive(Debug, Clone, Default)]
struct BreakerOverride {
    timeout: Option<Duration>,
    error_percent_threshold: Option<u32>,
    request_volume_threshold: Option<u32>,
    sleep_window: Option<Duration>,
}

impl BreakerOverrides {
    /// Start building an override table.
    pub fn builder() -> BreakerOverridesBuilder {
        BreakerOverridesBuilder::default()
    }

    fn get(&self, api: &str) -> Option<&BreakerOverride> {
        self.overrides.get(api)
    }
}

/// Builder for [`BreakerOverrides`]; intended for tests and breaker tuning.
#[derive(Debug, Default)]
pub struct BreakerOverridesBuilder {
    overrides: HashMap<String, BreakerOverride>,
}

impl BreakerOverridesBuilder {
    /// Replace the computed breaker timeout for `api`.
    pub fn timeout(mut self, api: impl Into<String>, timeout: Duration) -> Self {
        self.entry(api).timeout = Some(timeout);
        self
    }

    /// Replace the error-percentage threshold for `api`.
    pub fn error_percent_threshold(mut self, api: impl Into<String>, percent: u32) -> Self {
        self.entry(api).error_percent_threshold = Some(percent);
        self
    }

    /// Replace the request-volume threshold for `api`.
    pub fn request_volume_threshold(mut self, api: impl Into<String>, volume: u32) -> Self {
        self.entry(api).request_volume_threshold = Some(volume);
        self
    }

    /// Replace the sleep window for `api`.
    pub fn sleep_window(mut self, api: impl Into<String>, window: Duration) -> Self {
        self.entry(api).sleep_window = Some(window);
        self
    }

    /// Finish building.
    pub fn build(self) -> BreakerOverrides {
        BreakerOverrides {
            overrides: self.overrides,
        }
    }

    fn entry(&mut self, api: impl Into<String>) -> &mut BreakerOverride {
        self.overrides.entry(api.into()).or_default()
    }
}

/// Decorates an [`HttpCommand`] with a circuit breaker, a concurrency
/// ceiling, and the composed timeout.
///
/// The breaker and its statistics are owned here, not by the wrapped command,
/// so a hot reload can swap the inner command without resetting them.
pub(crate) struct ResilientCommand {
    api_name: String,
    breaker: CircuitBreaker,
    limiter: tokio::sync::Semaphore,
    timeout: Duration,
    inner: RwLock<Arc<HttpCommand>>,
}

impl ResilientCommand {
    pub(crate) fn new(inner: HttpCommand, api: &Api, overrides: &BreakerOverrides) -> Self {
        let mut timeout = Duration::from_millis(api.timeout_with_retry_included());
        let mut breaker_config = BreakerConfig::default();

        if let Some(over) = overrides.get(&api.name) {
            if let Some(t) = over.timeout {
                timeout = t;
            }
            if let Some(p) = over.error_percent_threshold {
                breaker_config.error_percent_threshold = p;
            }
            if let Some(v) = over.request_volume_threshold {
                breaker_config.request_volume_threshold = v;
            }
            if let Some(w) = over.sleep_window {
                breaker_config.sleep_window = w;
            }
        }

        Self {
            api_name: api.name.clone(),
            breaker: CircuitBreaker::new(breaker_config),
            limiter: tokio::sync::Semaphore::new(api.concurrency as usize),
            timeout,
            inner: RwLock::new(Arc::new(inner)),
        }
    }

    /// Execute the wrapped command inside the breaker-protected section.
    ///
    /// A classification produced by the wrapped command passes through
    /// unchanged; only breaker-internal short-circuits are classified here.
    pub(crate) async fn execute(&self, request: &GoxRequest) -> Result<GoxResponse, GoxHttpError> {
        if !self.breaker.is_allowed() {
            warn!(api = %self.api_name, "circuit open, short-circuiting call");
            return Err(GoxHttpError::new(
                ErrorCode::CircuitOpen,
                400,
                "hystrix circuit open",
            ));
        }

        let _permit = match self.limiter.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                // The call never runs, so hand back any half-open probe slot
                self.breaker.release_probe();
                warn!(api = %self.api_name, "concurrency ceiling exceeded, rejecting call");
                return Err(GoxHttpError::new(
                    ErrorCode::CircuitRejected,
                    400,
                    "hystrix rejected",
                ));
            }
        };

        // Snapshot the inner command so a concurrent reload cannot affect
        // this in-flight call
        let inner = self.inner.read().clone();

        match tokio::time::timeout(self.timeout, inner.execute(request)).await {
            Ok(Ok(response)) => {
                self.breaker.record_success();
                Ok(response)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                Err(e)
            }
            Err(_) => {
                self.breaker.record_failure();
                Err(GoxHttpError::new(
                    ErrorCode::CircuitTimeout,
                    400,
                    "hystrix timeout",
                ))
            }
        }
    }

    /// Swap the wrapped command, preserving breaker identity and statistics.
    pub(crate) fn update_command(&self, inner: HttpCommand) {
        *self.inner.write() = Arc::new(inner);
    }
}
