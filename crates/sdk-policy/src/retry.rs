use crate::{FailurePolicy, DEFAULT_REQUEST_TIMEOUT};
use sdk_backoff::{Backoff, ExponentialBackoff};
use sdk_core::{
    AfterFailureResolution, AfterSuccessResolution, BeforeResolution, ExecutionEvent,
    ExecutionFailure, ProgrammerError, Reason,
};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_MAX_CONTIGUOUS_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_START: Duration = Duration::from_millis(2000);
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Configuration for a [`RetryPolicy`], built with a [`RetryConfigBuilder`].
pub struct RetryConfig {
    pub(crate) max_contiguous_retries: u32,
    pub(crate) request_timeout: Duration,
    pub(crate) backoff: Box<dyn Backoff>,
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }
}

/// Builder for [`RetryConfig`], following the resilience crates' fluent
/// config-builder convention.
pub struct RetryConfigBuilder {
    max_contiguous_retries: u32,
    request_timeout: Duration,
    backoff: Box<dyn Backoff>,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_contiguous_retries: DEFAULT_MAX_CONTIGUOUS_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff: Box::new(ExponentialBackoff::new(DEFAULT_BACKOFF_START).with_factor(DEFAULT_BACKOFF_FACTOR)),
        }
    }

    /// Default: 5.
    pub fn max_contiguous_retries(mut self, n: u32) -> Self {
        self.max_contiguous_retries = n;
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

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_contiguous_retries: self.max_contiguous_retries,
            request_timeout: self.request_timeout,
            backoff: self.backoff,
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct RetryState {
    /// Signed run length of same-outcome events: positive during a success
    /// streak, negative during a failure streak.
    streak: i64,
    /// Unmatched `up()` calls the backoff has seen; negative while a failure
    /// streak owes the backoff a matching `down()`.
    balance: i64,
    last_call_time: Option<Instant>,
}

/// Retries up to `max_contiguous_retries` times, backing off between
/// attempts once a failure streak starts.
pub struct RetryPolicy {
    max_contiguous_retries: u32,
    request_timeout: Duration,
    backoff: Box<dyn Backoff>,
    state: Mutex<RetryState>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            max_contiguous_retries: config.max_contiguous_retries,
            request_timeout: config.request_timeout,
            backoff: config.backoff,
            state: Mutex::new(RetryState {
                streak: 0,
                balance: 0,
                last_call_time: None,
            }),
        }
    }

    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    pub fn max_contiguous_retries(&self) -> u32 {
        self.max_contiguous_retries
    }
}

impl FailurePolicy for RetryPolicy {
    fn before_execution(
        &self,
        info: &ExecutionEvent,
    ) -> Result<BeforeResolution, ProgrammerError> {
        let mut state = self.state.lock().expect("retry policy mutex poisoned");
        let elapsed = state
            .last_call_time
            .map(|last| info.time.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        state.last_call_time = Some(info.time);

        if state.balance >= 0 {
            Ok(BeforeResolution::Continue {
                timeout: self.request_timeout,
            })
        } else {
            let backoff = self.backoff.current().saturating_sub(elapsed);
            Ok(BeforeResolution::Backoff {
                backoff,
                timeout: self.request_timeout,
            })
        }
    }

    fn after_success(
        &self,
        _info: &ExecutionEvent,
    ) -> Result<AfterSuccessResolution, ProgrammerError> {
        let mut state = self.state.lock().expect("retry policy mutex poisoned");
        state.streak = (state.streak + 1).max(1);
        if state.balance < 0 {
            state.balance += 1;
            self.backoff.down();
        }
        Ok(AfterSuccessResolution::Continue)
    }

    fn after_failure(
        &self,
        _info: &ExecutionEvent,
        _failure: &ExecutionFailure,
    ) -> Result<AfterFailureResolution, ProgrammerError> {
        let mut state = self.state.lock().expect("retry policy mutex poisoned");
        state.streak = (state.streak - 1).min(-1);
        if state.streak.unsigned_abs() as u32 > self.max_contiguous_retries {
            Ok(AfterFailureResolution::Abort {
                reason: Reason::new(format!(
                    "Max ({}) retries exceeded",
                    self.max_contiguous_retries
                )),
            })
        } else {
            state.balance -= 1;
            self.backoff.up();
            Ok(AfterFailureResolution::Retry)
        }
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("retry policy mutex poisoned");
        while state.balance < 0 {
            self.backoff.down();
            state.balance += 1;
        }
        state.streak = 0;
        state.last_call_time = None;
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

    /// P1: the number of consecutive `afterFailure` that can return `retry`
    /// is exactly `n`; the `(n+1)`th returns `abort`.
    #[test]
    fn retries_exactly_n_times_then_aborts() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_contiguous_retries(3).build());
        let now = Instant::now();

        for _ in 0..3 {
            let resolution = policy
                .after_failure(&event_at(now), &ExecutionFailure::Http(500))
                .unwrap();
            assert!(matches!(resolution, AfterFailureResolution::Retry));
        }

        let resolution = policy
            .after_failure(&event_at(now), &ExecutionFailure::Http(500))
            .unwrap();
        assert!(matches!(resolution, AfterFailureResolution::Abort { .. }));
    }

    /// P2: after k failures followed by k successes, the backoff returns to
    /// its initial value and balance returns to zero (observable here as
    /// `beforeExecution` going back to `continue` rather than `backoff`).
    #[test]
    fn k_failures_then_k_successes_restore_initial_state() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_contiguous_retries(5).build());
        let now = Instant::now();

        for _ in 0..3 {
            policy
                .after_failure(&event_at(now), &ExecutionFailure::Http(500))
                .unwrap();
        }
        for _ in 0..3 {
            policy.after_success(&event_at(now)).unwrap();
        }

        let resolution = policy.before_execution(&event_at(now)).unwrap();
        assert!(matches!(resolution, BeforeResolution::Continue { .. }));
    }

    #[test]
    fn before_execution_backs_off_during_a_failure_streak() {
        let policy = RetryPolicy::new(
            RetryConfig::builder()
                .max_contiguous_retries(5)
                .backoff(Box::new(ExponentialBackoff::new(Duration::from_millis(100))))
                .build(),
        );
        let now = Instant::now();

        policy
            .after_failure(&event_at(now), &ExecutionFailure::Http(500))
            .unwrap();

        let resolution = policy.before_execution(&event_at(now)).unwrap();
        match resolution {
            BeforeResolution::Backoff { backoff, .. } => {
                assert!(backoff > Duration::ZERO);
            }
            other => panic!("expected Backoff, got {other:?}"),
        }
    }

    #[test]
    fn reset_unwinds_balance_and_streak() {
        let policy = RetryPolicy::new(RetryConfig::builder().max_contiguous_retries(5).build());
        let now = Instant::now();

        for _ in 0..2 {
            policy
                .after_failure(&event_at(now), &ExecutionFailure::Http(500))
                .unwrap();
        }
        policy.reset();

        let resolution = policy.before_execution(&event_at(now)).unwrap();
        assert!(matches!(resolution, BeforeResolution::Continue { .. }));
    }
}
