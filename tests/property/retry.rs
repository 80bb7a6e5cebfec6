//! Property tests for `RetryPolicy`.
//!
//! Invariants tested:
//! - P1: exactly `n` consecutive `afterFailure` calls return `retry`; the
//!   `(n+1)`th returns `abort`.
//! - P2: `k` failures followed by `k` successes restore the initial state
//!   (`beforeExecution` goes back to `continue` rather than `backoff`).

use proptest::prelude::*;
use sdk_core::{AfterFailureResolution, BeforeResolution, ExecutionEvent, ExecutionFailure};
use sdk_policy::{FailurePolicy, RetryConfig, RetryPolicy};
use std::time::Instant;

fn event_at(time: Instant) -> ExecutionEvent {
    ExecutionEvent::with_registry_cache_age(time, std::time::Duration::ZERO)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// P1: for any `n`, a fresh `RetryPolicy(n)` retries exactly `n` times
    /// then aborts on the `(n + 1)`th contiguous failure.
    #[test]
    fn retries_exactly_n_times_then_aborts(n in 0u32..20) {
        let policy = RetryPolicy::new(RetryConfig::builder().max_contiguous_retries(n).build());
        let now = Instant::now();

        for _ in 0..n {
            let resolution = policy.after_failure(&event_at(now), &ExecutionFailure::Http(500)).unwrap();
            prop_assert!(matches!(resolution, AfterFailureResolution::Retry));
        }

        let resolution = policy.after_failure(&event_at(now), &ExecutionFailure::Http(500)).unwrap();
        prop_assert!(matches!(resolution, AfterFailureResolution::Abort { .. }));
    }

    /// P2: for any `n` and any `k <= n`, `k` failures followed by `k`
    /// successes bring the policy back to `continue` rather than `backoff`.
    #[test]
    fn k_failures_then_k_successes_restore_initial_state(n in 1u32..20, k in 0u32..20) {
        let k = k.min(n);
        let policy = RetryPolicy::new(RetryConfig::builder().max_contiguous_retries(n).build());
        let now = Instant::now();

        for _ in 0..k {
            policy.after_failure(&event_at(now), &ExecutionFailure::Http(500)).unwrap();
        }
        for _ in 0..k {
            policy.after_success(&event_at(now)).unwrap();
        }

        let resolution = policy.before_execution(&event_at(now)).unwrap();
        prop_assert!(matches!(resolution, BeforeResolution::Continue { .. }));
    }
}
