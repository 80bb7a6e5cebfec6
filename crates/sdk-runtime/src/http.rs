//! The HTTP transport seam.
//!
//! Real transport implementations (reqwest-based or otherwise) are out of
//! scope per spec.md §1 — this crate depends only on [`HttpTransport`], the
//! single operation the fetch driver needs.

use futures::future::BoxFuture;
use sdk_core::{ExecutionFailure, NetworkIssue, RequestIssue};
use std::collections::HashMap;
use std::time::Duration;

/// Per-attempt request shape passed to the transport.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// A successful HTTP response as seen by the policy layer. Body shaping is
/// the map interpreter's job; the runtime only needs the status code to
/// classify success/failure.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Failures the transport itself can raise, one level below the policy
/// layer's [`ExecutionFailure`] — kept as a distinct type because a
/// transport crate should not need to depend on `sdk-core` to report a DNS
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Dns,
    Timeout,
    UnsignedSsl,
    Reject,
    RequestTimeout,
    RequestAbort,
}

impl From<TransportFailure> for ExecutionFailure {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Dns => ExecutionFailure::Network(NetworkIssue::Dns),
            TransportFailure::Timeout => ExecutionFailure::Network(NetworkIssue::Timeout),
            TransportFailure::UnsignedSsl => ExecutionFailure::Network(NetworkIssue::UnsignedSsl),
            TransportFailure::Reject => ExecutionFailure::Network(NetworkIssue::Reject),
            TransportFailure::RequestTimeout => ExecutionFailure::Request(RequestIssue::Timeout),
            TransportFailure::RequestAbort => ExecutionFailure::Request(RequestIssue::Abort),
        }
    }
}

/// The single operation the fetch driver depends on. Concrete transports are
/// supplied by the caller.
///
/// Object-safe by construction (boxed future return, matching
/// `sdk-interceptor`'s handler types) so the driver can hold
/// `Arc<dyn HttpTransport>` without committing to a concrete transport.
pub trait HttpTransport: Send + Sync {
    fn fetch(
        &self,
        url: String,
        options: RequestOptions,
    ) -> BoxFuture<'_, Result<HttpResponse, TransportFailure>>;
}

/// Classifies an HTTP response into success or a policy-level failure.
/// Matches spec.md §3's `ExecutionFailure::Http(statusCode)` variant: any
/// status 400 and above is a failure, everything else (1xx/2xx/3xx) is a
/// success. The map interpreter's own response-handler matching (which
/// status codes mean business-level success for a given use case) is out of
/// scope here — this is only the policy-facing classification.
pub fn classify_status(status_code: u16) -> Option<ExecutionFailure> {
    if status_code >= 400 {
        Some(ExecutionFailure::Http(status_code))
    } else {
        None
    }
}
