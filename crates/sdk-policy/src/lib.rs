//! Failure policies: abort, retry with exponential backoff, and circuit
//! breaker. All three share the [`FailurePolicy`] capability interface; the
//! inheritance hierarchy the source modeled as a class tree (Abort / Retry /
//! CircuitBreaker extending a common base) collapses here to a sum of
//! independent implementations behind one trait, with composition (the
//! breaker embedding a retry policy) expressed as a plain field.

pub mod abort;
pub mod circuit_breaker;
pub mod retry;

pub use abort::AbortPolicy;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState};
pub use retry::{RetryConfig, RetryPolicy};

use sdk_core::{AfterFailureResolution, AfterSuccessResolution, BeforeResolution, ExecutionEvent, ExecutionFailure, ProgrammerError};
use std::time::Duration;

/// Per-(provider, use-case) decision object. Implementations never panic:
/// even the states the design declares unreachable (a circuit breaker
/// receiving `afterFailure` while already open) are surfaced as
/// `Err(ProgrammerError)` rather than an unwind, so the caller can choose how
/// loudly to fail.
pub trait FailurePolicy: Send + Sync {
    /// Called exactly once per physical HTTP attempt, before it is made.
    fn before_execution(
        &self,
        info: &ExecutionEvent,
    ) -> Result<BeforeResolution, ProgrammerError>;

    /// Called when an attempt's terminating callback is a success.
    fn after_success(
        &self,
        info: &ExecutionEvent,
    ) -> Result<AfterSuccessResolution, ProgrammerError>;

    /// Called when an attempt's terminating callback is a failure.
    fn after_failure(
        &self,
        info: &ExecutionEvent,
        failure: &ExecutionFailure,
    ) -> Result<AfterFailureResolution, ProgrammerError>;

    /// Returns the policy to its initial state.
    fn reset(&self);

    /// The per-HTTP-attempt deadline this policy enforces.
    fn request_timeout(&self) -> Duration;

    /// Whether this policy is an [`AbortPolicy`]. The router consults this
    /// during failover-restore search: a provider guarded only by
    /// `AbortPolicy` always reports `continue`, so it cannot supply a
    /// meaningful health signal and is excluded as a restore target.
    fn is_abort_policy(&self) -> bool {
        false
    }
}

/// Default request timeout used when a policy's configuration omits one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);
