//! Bound-provider cache and perform driver (C5).
//!
//! Wires `sdk-router`'s failover decisions and `sdk-interceptor`'s event
//! engine around a single `perform()` call: [`cache`] is the single-flight
//! TTL cache of bound artifacts, [`http`] is the transport seam, [`fetch`]
//! is the `pre-fetch`/`post-fetch` adapter around one HTTP attempt, and
//! [`driver`] is the `pre-perform`/`post-perform` loop that ties them
//! together. [`invocation`] is the per-call state threaded through both
//! event cycles.

pub mod cache;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod http;
pub mod invocation;

pub use cache::{BoundProviderCache, SharedInitError};
pub use driver::{Binder, BoundArtifact, PerformArgs, PerformDriver, PerformEvent, PerformOutcome};
pub use error::PerformError;
pub use fetch::{FetchArgs, FetchError, FetchExecutor, FetchOutcome};
pub use http::{classify_status, HttpResponse, HttpTransport, RequestOptions, TransportFailure};
pub use invocation::{InvocationState, QueuedAction};
