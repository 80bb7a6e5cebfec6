//! Shared data model and event scaffolding for the profile client runtime.
//!
//! This crate has no opinion on policies, routing, or caching — it only
//! defines the vocabulary (`UseCaseId`, `CacheKey`, `ExecutionEvent`,
//! `ExecutionFailure`, the resolution enums, `Reason`) and the panic-isolating
//! event broadcast that the other `sdk-*` crates build on.

pub mod error;
pub mod events;
pub mod model;
pub mod reason;
pub mod resolution;

pub use error::ProgrammerError;
pub use events::{EventListener, EventListeners, FnListener, RuntimeEvent};
pub use model::{
    CacheKey, ExecutionEvent, ExecutionFailure, NetworkIssue, RequestIssue, Safety, UseCaseId,
};
pub use reason::Reason;
pub use resolution::{AfterFailureResolution, AfterSuccessResolution, BeforeResolution};
