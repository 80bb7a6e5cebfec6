//! Resolutions returned by policies and by the router to steer the next step.
//!
//! `SwitchProvider` is reachable only through `AfterFailureResolution` and
//! `BeforeResolution` because invariant 1 (only the router ever returns
//! `switch-provider`) is enforced at the type level: `FailurePolicy`
//! implementations build `BeforeResolution`/`AfterFailureResolution` values,
//! but the router is the only caller positioned to fill in `SwitchProvider`'s
//! `provider` field with anything other than itself.

use crate::reason::Reason;
use std::time::Duration;

/// Resolution returned by `beforeExecution`.
#[derive(Debug, Clone)]
pub enum BeforeResolution {
    /// Proceed with this request timeout.
    Continue { timeout: Duration },
    /// Sleep `backoff`, then proceed with this timeout.
    Backoff { backoff: Duration, timeout: Duration },
    /// Cancel the request; surface as a failure.
    Abort { reason: Reason },
    /// Router-only: redirect to the named provider.
    SwitchProvider { provider: String, reason: Reason },
}

/// Resolution returned by `afterSuccess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSuccessResolution {
    Continue,
}

/// Resolution returned by `afterFailure`.
#[derive(Debug, Clone)]
pub enum AfterFailureResolution {
    /// Repeat the same request (same provider, same input).
    Retry,
    /// Stop; surface the error.
    Abort { reason: Reason },
    /// Router-only: redirect to the named provider.
    SwitchProvider { provider: String, reason: Reason },
}
