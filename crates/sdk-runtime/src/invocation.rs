//! Per-invocation state threaded through the fetch and perform event chains.
//!
//! The interceptor engine's handler registrations (in `sdk-interceptor`) are
//! long-lived and shared across every call to a given use case — that is
//! what lets a caller register a logging handler once. But `checkFailoverRestore`
//! and the queued switch-provider/recache action are properties of *one*
//! `perform()` invocation, not of the registry. Per spec.md §4.4's "each
//! in-flight use case has its own handler chain state", that per-call state
//! is carried alongside the event args as an `Arc<InvocationState>` rather
//! than captured by a handler closure, so concurrent invocations sharing the
//! same registered handlers never see each other's state.

use sdk_core::{Reason, UseCaseId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// An action a fetch-level handler decided on but that can only be carried
/// out between perform-loop iterations: switching the bound-provider cache
/// key (switch-provider) or dropping a stale bound artifact (recache).
#[derive(Debug, Clone)]
pub enum QueuedAction {
    SwitchProvider { provider: String, reason: Reason },
    Recache,
}

pub struct InvocationState {
    pub use_case: UseCaseId,
    pub cancellation: CancellationToken,
    /// `registryCacheAge`: milliseconds since the bound artifact now in use
    /// was last (re)initialized. Advisory per spec.md §9's Open Question;
    /// carried but consulted by no built-in policy.
    pub registry_cache_age: Duration,
    first_attempt: AtomicBool,
    pending_action: Mutex<Option<QueuedAction>>,
}

impl InvocationState {
    pub fn new(use_case: UseCaseId, cancellation: CancellationToken) -> Self {
        Self {
            use_case,
            cancellation,
            registry_cache_age: Duration::ZERO,
            first_attempt: AtomicBool::new(true),
            pending_action: Mutex::new(None),
        }
    }

    /// Returns whether this is the first physical attempt of the
    /// invocation, and clears the flag so every subsequent call observes
    /// `false`. Restore is only ever checked before the very first attempt.
    pub fn take_first_attempt(&self) -> bool {
        self.first_attempt.swap(false, Ordering::SeqCst)
    }

    pub fn queue_action(&self, action: QueuedAction) {
        *self.pending_action.lock().expect("invocation mutex poisoned") = Some(action);
    }

    pub fn has_pending_action(&self) -> bool {
        self.pending_action
            .lock()
            .expect("invocation mutex poisoned")
            .is_some()
    }

    pub fn take_pending_action(&self) -> Option<QueuedAction> {
        self.pending_action
            .lock()
            .expect("invocation mutex poisoned")
            .take()
    }
}
