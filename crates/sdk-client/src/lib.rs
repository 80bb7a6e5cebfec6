//! Public facade for the profile client runtime.
//!
//! Mirrors the teacher meta-crate's per-pattern optional-dependency layout:
//! each of the five core crates (`sdk-core`, `sdk-backoff`, `sdk-policy`,
//! `sdk-router`, `sdk-interceptor`) plus the bound-provider cache and perform
//! driver (`sdk-runtime`) is re-exported under a feature flag, and `full`
//! turns all of them on. What's new here, beyond re-exports, is the
//! configuration surface (§6): [`config::SuperConfig`] and friends,
//! [`env::SdkEnv`], and — with the `runtime` feature — [`client::OneClient`],
//! the facade that turns a parsed configuration into routers, policies, and
//! a perform driver per `(profile, use case)`.

pub mod config;
pub mod env;

pub use config::{
    BackoffConfig, ProfileConfig, ProviderConfig, ProviderSecurityConfig, RetryPolicyConfig,
    RetryPolicyKind, SuperConfig, UseCaseDefaults,
};
pub use env::SdkEnv;

pub use sdk_core as core;

#[cfg(feature = "backoff")]
pub use sdk_backoff as backoff;

#[cfg(feature = "policy")]
pub use sdk_policy as policy;

#[cfg(feature = "router")]
pub use sdk_router as router;

#[cfg(feature = "interceptor")]
pub use sdk_interceptor as interceptor;

#[cfg(feature = "runtime")]
pub use sdk_runtime as runtime;

#[cfg(feature = "runtime")]
pub mod client;

#[cfg(feature = "runtime")]
pub use client::{OneClient, PerformOptions};

#[cfg(feature = "runtime")]
pub use sdk_runtime::PerformError;
pub use sdk_core::ProgrammerError;
