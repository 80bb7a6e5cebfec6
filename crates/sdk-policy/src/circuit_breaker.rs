use crate::retry::{RetryConfig, RetryPolicy};
use crate::{FailurePolicy, DEFAULT_REQUEST_TIMEOUT};
use sdk_backoff::{Backoff, ExponentialBackoff};
use sdk_core::{
    AfterFailureResolution, AfterSuccessResolution, BeforeResolution, ExecutionEvent,
    ExecutionFailure, ProgrammerError, Reason,
};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(30_000);
const DEFAULT_BACKOFF_START: Duration = Duration::from_millis(2000);
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// The three-state circuit breaker lifecycle, exposed for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

enum Phase {
    Closed,
    Open { open_time: Instant },
    HalfOpen,
}

impl Phase {
    fn state(&self) -> CircuitState {
        match self {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

/// Configuration for a [`CircuitBreakerPolicy`].
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: u32,
    pub(crate) reset_timeout: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) backoff: Box<dyn Backoff>,
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

pub struct CircuitBreakerConfigBuilder {
    failure_threshold: u32,
    reset_timeout: Duration,
    request_timeout: Duration,
    backoff: Box<dyn Backoff>,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff: Box::new(
                ExponentialBackoff::new(DEFAULT_BACKOFF_START).with_factor(DEFAULT_BACKOFF_FACTOR),
            ),
        }
    }

    /// Consecutive failures required to trip the breaker. Default: 5.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Time the breaker stays open before allowing a half-open trial.
    /// Default: 30 000ms.
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Default: 30 000ms.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Default: `ExponentialBackoff(start = 2000ms, factor = 2.0)`.
    pub fn backoff(mut self, backoff: Box<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
            request_timeout: self.request_timeout,
            backoff: self.backoff,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed / open / half-open breaker embedding a retry policy whose
/// `maxContiguousRetries = failureThreshold - 1`: the breaker trips the
/// instant the embedded retry would have aborted.
pub struct CircuitBreakerPolicy {
    reset_timeout: Duration,
    request_timeout: Duration,
    inner: RetryPolicy,
    phase: Mutex<Phase>,
}

impl CircuitBreakerPolicy {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let inner = RetryPolicy::new(
            RetryConfig::builder()
                .max_contiguous_retries(config.failure_threshold.saturating_sub(1))
                .request_timeout(config.request_timeout)
                .backoff(config.backoff)
                .build(),
        );

        Self {
            reset_timeout: config.reset_timeout,
            request_timeout: config.request_timeout,
            inner,
            phase: Mutex::new(Phase::Closed),
        }
    }

    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// The breaker's current state, for observability.
    pub fn state(&self) -> CircuitState {
        self.phase.lock().expect("circuit mutex poisoned").state()
    }

    fn trip_open(&self, phase: &mut Phase, open_time: Instant) -> AfterFailureResolution {
        *phase = Phase::Open { open_time };
        self.inner.reset();

        #[cfg(feature = "tracing")]
        tracing::info!("circuit breaker tripped open");
        #[cfg(feature = "metrics")]
        metrics::counter!("sdk_circuit_breaker_opened_total").increment(1);

        AfterFailureResolution::Abort {
            reason: Reason::new("Circuit breaker is open"),
        }
    }
}

impl FailurePolicy for CircuitBreakerPolicy {
    fn before_execution(
        &self,
        info: &ExecutionEvent,
    ) -> Result<BeforeResolution, ProgrammerError> {
        let mut phase = self.phase.lock().expect("circuit mutex poisoned");
        match &*phase {
            Phase::Closed => self.inner.before_execution(info),
            Phase::HalfOpen => Ok(BeforeResolution::Continue {
                timeout: self.request_timeout,
            }),
            Phase::Open { open_time } => {
                if info.time >= *open_time + self.reset_timeout {
                    *phase = Phase::HalfOpen;
                    Ok(BeforeResolution::Continue {
                        timeout: self.request_timeout,
                    })
                } else {
                    Ok(BeforeResolution::Abort {
                        reason: Reason::new("Circuit breaker is open"),
                    })
                }
            }
        }
    }

    fn after_success(
        &self,
        info: &ExecutionEvent,
    ) -> Result<AfterSuccessResolution, ProgrammerError> {
        let mut phase = self.phase.lock().expect("circuit mutex poisoned");
        match &*phase {
            Phase::Closed => self.inner.after_success(info),
            Phase::HalfOpen => {
                *phase = Phase::Closed;
                self.inner.after_success(info)
            }
            Phase::Open { .. } => Err(ProgrammerError::new(
                "circuit_breaker::after_success",
                "afterSuccess observed while the circuit is open; beforeExecution should have \
                 aborted before any attempt was made",
            )),
        }
    }

    fn after_failure(
        &self,
        info: &ExecutionEvent,
        failure: &ExecutionFailure,
    ) -> Result<AfterFailureResolution, ProgrammerError> {
        let mut phase = self.phase.lock().expect("circuit mutex poisoned");
        match &*phase {
            Phase::Closed => match self.inner.after_failure(info, failure)? {
                AfterFailureResolution::Retry => Ok(AfterFailureResolution::Retry),
                AfterFailureResolution::Abort { .. } => Ok(self.trip_open(&mut phase, info.time)),
                AfterFailureResolution::SwitchProvider { .. } => Err(ProgrammerError::new(
                    "circuit_breaker::after_failure",
                    "embedded retry policy returned switch-provider; only the router may do that",
                )),
            },
            Phase::HalfOpen => Ok(self.trip_open(&mut phase, info.time)),
            Phase::Open { .. } => Err(ProgrammerError::new(
                "circuit_breaker::after_failure",
                "afterFailure observed while the circuit is already open",
            )),
        }
    }

    fn reset(&self) {
        *self.phase.lock().expect("circuit mutex poisoned") = Phase::Closed;
        self.inner.reset();
    }

    fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(time: Instant) -> ExecutionEvent {
        ExecutionEvent::with_registry_cache_age(time, Duration::ZERO)
    }

    /// P3: `t` consecutive failures trips the breaker; it stays open until
    /// `resetTimeout` elapses, then the next `beforeExecution` returns
    /// `continue` (half-open).
    #[test]
    fn trips_after_threshold_and_half_opens_after_reset_timeout() {
        let policy = CircuitBreakerPolicy::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(2)
                .reset_timeout(Duration::from_millis(100))
                .build(),
        );
        let t0 = Instant::now();

        policy
            .after_failure(&event_at(t0), &ExecutionFailure::Http(500))
            .unwrap();
        let second = policy
            .after_failure(&event_at(t0), &ExecutionFailure::Http(500))
            .unwrap();
        assert!(matches!(second, AfterFailureResolution::Abort { .. }));
        assert_eq!(policy.state(), CircuitState::Open);

        let still_open = policy
            .before_execution(&event_at(t0 + Duration::from_millis(50)))
            .unwrap();
        assert!(matches!(still_open, BeforeResolution::Abort { .. }));

        let half_open = policy
            .before_execution(&event_at(t0 + Duration::from_millis(150)))
            .unwrap();
        assert!(matches!(half_open, BeforeResolution::Continue { .. }));
        assert_eq!(policy.state(), CircuitState::HalfOpen);
    }

    /// P4: in half-open state, a single `afterFailure` reopens the breaker;
    /// a single `afterSuccess` closes it.
    #[test]
    fn half_open_failure_reopens_success_closes() {
        let policy = CircuitBreakerPolicy::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .reset_timeout(Duration::from_millis(10))
                .build(),
        );
        let t0 = Instant::now();

        policy
            .after_failure(&event_at(t0), &ExecutionFailure::Http(500))
            .unwrap();
        policy
            .before_execution(&event_at(t0 + Duration::from_millis(20)))
            .unwrap();
        assert_eq!(policy.state(), CircuitState::HalfOpen);

        policy
            .after_failure(&event_at(t0 + Duration::from_millis(20)), &ExecutionFailure::Http(500))
            .unwrap();
        assert_eq!(policy.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let policy = CircuitBreakerPolicy::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .reset_timeout(Duration::from_millis(10))
                .build(),
        );
        let t0 = Instant::now();

        policy
            .after_failure(&event_at(t0), &ExecutionFailure::Http(500))
            .unwrap();
        policy
            .before_execution(&event_at(t0 + Duration::from_millis(20)))
            .unwrap();
        policy
            .after_success(&event_at(t0 + Duration::from_millis(20)))
            .unwrap();
        assert_eq!(policy.state(), CircuitState::Closed);
    }

    #[test]
    fn reset_returns_to_closed() {
        let policy = CircuitBreakerPolicy::new(
            CircuitBreakerConfig::builder().failure_threshold(1).build(),
        );
        policy
            .after_failure(&event_at(Instant::now()), &ExecutionFailure::Http(500))
            .unwrap_or_else(|_| panic!("unexpected programmer error"));
        policy.reset();
        assert_eq!(policy.state(), CircuitState::Closed);
    }
}
