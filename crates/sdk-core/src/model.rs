//! Identity and execution data model shared by every component.

use std::fmt;
use std::time::{Duration, Instant};

/// Identifies a use case: `(profileId, useCaseName)`, where `profileId` is
/// `scope/name` or bare `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UseCaseId {
    pub profile_id: String,
    pub use_case_name: String,
}

impl UseCaseId {
    pub fn new(profile_id: impl Into<String>, use_case_name: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            use_case_name: use_case_name.into(),
        }
    }
}

impl fmt::Display for UseCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.profile_id, self.use_case_name)
    }
}

/// Declared call safety of a use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Safety {
    Safe,
    Unsafe,
    Idempotent,
}

/// Opaque, canonically-serialized identity of a bound (profile, provider)
/// artifact. Equal cache keys denote interchangeable bound artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds a cache key from the profile's and provider's own cache keys,
    /// per the concatenation rule in the data model: equal keys imply
    /// interchangeable bound artifacts.
    pub fn from_parts(profile_cache_key: &str, provider_cache_key: &str) -> Self {
        Self(format!("{profile_cache_key}::{provider_cache_key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context passed to a policy's `beforeExecution`/`afterSuccess`/`afterFailure`.
///
/// `registry_cache_age` is advisory per the Open Question in the design notes:
/// it is carried but consulted by no built-in policy.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionEvent {
    pub time: Instant,
    pub registry_cache_age: Duration,
}

impl ExecutionEvent {
    pub fn now() -> Self {
        Self {
            time: Instant::now(),
            registry_cache_age: Duration::ZERO,
        }
    }

    pub fn with_registry_cache_age(time: Instant, registry_cache_age: Duration) -> Self {
        Self {
            time,
            registry_cache_age,
        }
    }
}

/// A network-layer issue, one level below the HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkIssue {
    Dns,
    Timeout,
    UnsignedSsl,
    Reject,
}

/// A request-layer issue — the attempt never produced a network outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIssue {
    Timeout,
    Abort,
}

/// The outcome of a failed HTTP attempt, classified for policy consumption.
/// This is data, never an exception: it flows into `afterFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionFailure {
    Network(NetworkIssue),
    Request(RequestIssue),
    Http(u16),
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::Network(issue) => write!(f, "network/{issue:?}"),
            ExecutionFailure::Request(issue) => write!(f, "request/{issue:?}"),
            ExecutionFailure::Http(code) => write!(f, "http/{code}"),
        }
    }
}
