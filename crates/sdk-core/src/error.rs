//! The fail-fast primitive for states the design declares unreachable.
//!
//! The source this system was distilled from throws bare strings for
//! "unreachable" paths (an unset current provider, a circuit breaker
//! receiving `afterFailure` while already open, a retry loop that never
//! terminates). `ProgrammerError` replaces that: it is returned, never
//! panicked, and always carries a location tag identifying which invariant
//! was violated. Call sites that can hit one of these conditions return
//! `Result<_, ProgrammerError>` instead of unwinding; callers are expected to
//! never catch it and recover, only to surface it.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("programmer error at {location}: {message}")]
pub struct ProgrammerError {
    /// A stable identifier for the call site, e.g. `"router::before_execution"`.
    pub location: &'static str,
    pub message: String,
}

impl ProgrammerError {
    pub fn new(location: &'static str, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}
