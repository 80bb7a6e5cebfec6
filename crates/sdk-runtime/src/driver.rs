//! The perform driver: bind-and-perform around one `perform()` call.
//!
//! Implements the seven-step loop of spec.md §4.5. Provider selection and
//! failover live in `sdk-router`; retrying and backing off one HTTP attempt
//! lives in `fetch`'s pre-fetch/post-fetch adapter. What's left here is
//! narrower than either: resolve (or re-resolve) the bound artifact through
//! the single-flight cache, wrap one `artifact.perform()` call as
//! `pre-perform`/`post-perform`, and drain whatever the fetch layer queued on
//! `InvocationState` — a provider switch or a cache invalidation — by looping
//! back to artifact resolution rather than returning.

use crate::cache::{BoundProviderCache, SharedInitError};
use crate::error::PerformError;
use crate::fetch::FetchExecutor;
use crate::invocation::{InvocationState, QueuedAction};
use futures::future::BoxFuture;
use sdk_core::{CacheKey, EventListeners, FnListener, RuntimeEvent, UseCaseId};
use sdk_interceptor::{EventContext, EventEngine, RetryLimitExceeded};
use sdk_router::PolicyRouter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Opaque to this crate: produced by an external profile/provider binder that
/// reads the profile AST, the map AST, and the provider service list. The
/// driver depends only on this single operation.
///
/// `perform` is handed the fetcher so its (out-of-scope) map interpreter can
/// issue HTTP requests through `pre-fetch`/`post-fetch`, and the invocation's
/// shared state so a fetch-level handler's queued switch-provider/recache
/// survives until the driver inspects it after this call returns.
pub trait BoundArtifact: Send + Sync {
    fn perform<'a>(
        &'a self,
        fetcher: &'a FetchExecutor,
        use_case_name: &'a str,
        input: serde_json::Value,
        invocation: Arc<InvocationState>,
    ) -> BoxFuture<'a, Result<serde_json::Value, PerformError>>;
}

/// A binder function: produces a fresh bound artifact for `provider`. Kept
/// generic so this crate never names the concrete artifact type, which
/// belongs to the profile provider binder.
pub type Binder<A> =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<A, SharedInitError>> + Send + Sync>;

/// What a caller supplies per `perform()` call; carried through
/// `pre-perform`/`post-perform` so registered handlers can see and reshape it.
#[derive(Clone)]
pub struct PerformArgs {
    pub use_case_name: String,
    pub input: serde_json::Value,
}

pub type PerformOutcome = Result<serde_json::Value, PerformError>;

impl RetryLimitExceeded for PerformOutcome {
    fn retry_limit_exceeded() -> Self {
        Err(PerformError::Unexpected(
            "perform iteration cap exceeded".to_string(),
        ))
    }
}

/// The three events spec.md §4 calls out as fire-and-forget observation
/// points, unlike `pre-perform`/`post-perform` which can steer the call.
#[derive(Debug, Clone)]
pub enum PerformEvent {
    Success {
        use_case: UseCaseId,
        provider: String,
        timestamp: Instant,
    },
    Failure {
        use_case: UseCaseId,
        provider: String,
        reason: String,
        timestamp: Instant,
    },
    ProviderSwitch {
        use_case: UseCaseId,
        from: Option<String>,
        to: String,
        reason: String,
        timestamp: Instant,
    },
}

impl RuntimeEvent for PerformEvent {
    fn event_name(&self) -> &'static str {
        match self {
            PerformEvent::Success { .. } => "success",
            PerformEvent::Failure { .. } => "failure",
            PerformEvent::ProviderSwitch { .. } => "provider-switch",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PerformEvent::Success { timestamp, .. }
            | PerformEvent::Failure { timestamp, .. }
            | PerformEvent::ProviderSwitch { timestamp, .. } => *timestamp,
        }
    }
}

/// A per-invocation iteration cap lower than 1 would mean a `perform()` call
/// that can never complete even its first attempt.
const MIN_ITERATION_CAP: u32 = 1;

/// Orchestrates one (profile, use case) pair's `perform()` calls: cache
/// resolution, `pre-perform`/`post-perform`, and the switch-provider/recache
/// loop.
pub struct PerformDriver<A: BoundArtifact> {
    use_case: UseCaseId,
    profile_cache_key: String,
    cache_ttl: Duration,
    cache: BoundProviderCache<A>,
    router: Arc<PolicyRouter>,
    fetcher: Arc<FetchExecutor>,
    bind: Binder<A>,
    events: EventEngine<PerformArgs, PerformOutcome>,
    iteration_cap: u32,
    listeners: EventListeners<PerformEvent>,
}

impl<A: BoundArtifact + 'static> PerformDriver<A> {
    /// `iteration_cap` bounds the switch-provider/recache loop; spec.md §4.5
    /// recommends the maximum retry count across the use case's policies,
    /// never less than 1. Fetch-level retries (within one bound artifact)
    /// are governed separately by the fetcher's own retry cap.
    pub fn new(
        use_case: UseCaseId,
        profile_cache_key: impl Into<String>,
        cache_ttl: Duration,
        router: Arc<PolicyRouter>,
        fetcher: Arc<FetchExecutor>,
        bind: Binder<A>,
        iteration_cap: u32,
    ) -> Self {
        Self {
            use_case,
            profile_cache_key: profile_cache_key.into(),
            cache_ttl,
            cache: BoundProviderCache::new(),
            router,
            fetcher,
            bind,
            events: EventEngine::new(),
            iteration_cap: iteration_cap.max(MIN_ITERATION_CAP),
            listeners: EventListeners::new(),
        }
    }

    /// The event engine backing `pre-perform`/`post-perform`, for registering
    /// observability or argument-shaping handlers alongside the driver's own
    /// loop logic, which does not register any handler here itself.
    pub fn events(&self) -> &EventEngine<PerformArgs, PerformOutcome> {
        &self.events
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&UseCaseId, &str) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &PerformEvent| {
            if let PerformEvent::Success { use_case, provider, .. } = event {
                f(use_case, provider);
            }
        }));
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&UseCaseId, &str, &str) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &PerformEvent| {
            if let PerformEvent::Failure { use_case, provider, reason, .. } = event {
                f(use_case, provider, reason);
            }
        }));
        self
    }

    pub fn on_provider_switch<F>(mut self, f: F) -> Self
    where
        F: Fn(&UseCaseId, Option<&str>, &str, &str) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event: &PerformEvent| {
            if let PerformEvent::ProviderSwitch { use_case, from, to, reason, .. } = event {
                f(use_case, from.as_deref(), to, reason);
            }
        }));
        self
    }

    /// Runs the seven-step algorithm to completion, looping internally on a
    /// queued switch-provider or recache up to `iteration_cap` times.
    pub async fn perform(
        &self,
        explicit_provider: Option<String>,
        use_case_name: String,
        input: serde_json::Value,
        cancellation: CancellationToken,
    ) -> PerformOutcome {
        // Steps 1-2: resolve the provider choice and this invocation's
        // failover permission.
        match &explicit_provider {
            Some(provider) => {
                self.router.set_current_provider(provider.clone()).await;
                self.router.set_allow_failover(false).await;
            }
            None => {
                self.router.set_allow_failover(true).await;
            }
        }

        let invocation = Arc::new(InvocationState::new(self.use_case.clone(), cancellation));

        for _ in 0..self.iteration_cap {
            let provider = match self.router.get_current_provider().await {
                Some(provider) => provider,
                None => {
                    return Err(PerformError::Unexpected(
                        "router has no current provider".to_string(),
                    ))
                }
            };

            // Step 3: resolve the bound artifact, single-flight, TTL-cached.
            let cache_key = CacheKey::from_parts(&self.profile_cache_key, &provider);
            let bind = self.bind.clone();
            let provider_for_bind = provider.clone();
            let artifact = match self
                .cache
                .get(cache_key.clone(), self.cache_ttl, move || {
                    bind(provider_for_bind)
                })
                .await
            {
                Ok(artifact) => artifact,
                Err(err) => return Err(PerformError::from(err)),
            };

            // Steps 4-5: pre-perform, bind-and-perform, wrapped as one
            // pre/call/post cycle. The driver's own engine has no built-in
            // handler; callers may have registered observability hooks.
            let provider_for_ctx = self.router.get_current_provider().await;
            let ctx = EventContext {
                profile: Some(self.use_case.profile_id.clone()),
                usecase: Some(use_case_name.clone()),
                provider: provider_for_ctx.clone(),
                ..EventContext::default()
            };
            let args = PerformArgs {
                use_case_name: use_case_name.clone(),
                input: input.clone(),
            };

            let fetcher = self.fetcher.clone();
            let invocation_for_call = invocation.clone();
            let outcome = self
                .events
                .dispatch(ctx, args, self.iteration_cap, move |_ctx, args| {
                    let artifact = artifact.clone();
                    let fetcher = fetcher.clone();
                    let invocation = invocation_for_call.clone();
                    async move {
                        artifact
                            .perform(&fetcher, &args.use_case_name, args.input, invocation)
                            .await
                    }
                })
                .await;

            // Step 6: drain a queued action, if any, and loop back to step 3.
            if let Some(action) = invocation.take_pending_action() {
                match action {
                    QueuedAction::SwitchProvider { provider: next, reason } => {
                        let from = self.router.get_current_provider().await;
                        self.router.set_current_provider(next.clone()).await;
                        self.listeners.emit(&PerformEvent::ProviderSwitch {
                            use_case: self.use_case.clone(),
                            from,
                            to: next,
                            reason: reason.to_string(),
                            timestamp: Instant::now(),
                        });
                        continue;
                    }
                    QueuedAction::Recache => {
                        self.cache.invalidate(&cache_key).await;
                        continue;
                    }
                }
            }

            // Step 7: terminal success/failure.
            let provider = self.router.get_current_provider().await.unwrap_or(provider);
            match &outcome {
                Ok(_) => self.listeners.emit(&PerformEvent::Success {
                    use_case: self.use_case.clone(),
                    provider,
                    timestamp: Instant::now(),
                }),
                Err(err) => self.listeners.emit(&PerformEvent::Failure {
                    use_case: self.use_case.clone(),
                    provider,
                    reason: err.to_string(),
                    timestamp: Instant::now(),
                }),
            }
            return outcome;
        }

        Err(PerformError::Unexpected(
            "perform iteration cap exceeded".to_string(),
        ))
    }
}
