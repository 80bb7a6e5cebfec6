//! The result surface `PerformDriver::perform` hands back to its caller.
//!
//! Mirrors spec.md §6's terminal error shape. The map interpreter and the
//! provider binder (both out of scope here) are the two external sources of
//! `ResultValidation`/`MapInterpreterError`; everything else originates in
//! this crate or is forwarded from a lower layer.

use sdk_core::{ProgrammerError, Reason};
use thiserror::Error;

use crate::cache::SharedInitError;

#[derive(Debug, Clone, Error)]
pub enum PerformError {
    /// The caller's input didn't satisfy the use case's declared input shape.
    #[error("input validation failed: {0}")]
    InputValidation(String),

    /// The provider's response didn't satisfy the use case's declared result shape.
    #[error("result validation failed: {0}")]
    ResultValidation(String),

    /// A failure policy (or the router) resolved to `abort`.
    #[error("aborted: {0}")]
    PolicyAbort(Reason),

    /// The map interpreter raised while executing a use case's map.
    #[error("map interpreter error: {0}")]
    MapInterpreterError(String),

    /// Anything else, including a violated invariant surfaced as a
    /// `ProgrammerError` and a bound-provider cache initialization failure.
    #[error("{0}")]
    Unexpected(String),
}

impl From<ProgrammerError> for PerformError {
    fn from(err: ProgrammerError) -> Self {
        PerformError::Unexpected(err.to_string())
    }
}

impl From<SharedInitError> for PerformError {
    fn from(err: SharedInitError) -> Self {
        PerformError::Unexpected(format!("bound-provider cache: {err}"))
    }
}
