//! `pre-fetch` / `post-fetch`: one HTTP attempt wrapped in the event cycle
//! that lets the router retry, back off, switch providers, or abort.
//!
//! This is the "failover event adapter" of spec.md §4.4: a pair of priority-1
//! handlers registered once per [`FetchExecutor`] that consult the
//! [`PolicyRouter`] and translate its resolutions into the
//! continue/modify/retry/abort vocabulary `sdk-interceptor::EventEngine`
//! already knows how to drive. The map interpreter (out of scope) is the
//! intended caller of [`FetchExecutor::fetch`]: every HTTP request it needs
//! to issue for a use case goes through here instead of hitting the
//! transport directly, which is how `pre-fetch`/`post-fetch` end up wrapping
//! every physical attempt as spec.md's data-flow diagram requires.

use crate::http::{classify_status, HttpResponse, HttpTransport, RequestOptions};
use crate::invocation::{InvocationState, QueuedAction};
use sdk_core::{
    AfterFailureResolution, BeforeResolution, ExecutionEvent, ExecutionFailure, Reason,
};
use sdk_interceptor::{EventContext, EventEngine, PostResolution, PreResolution, RetryLimitExceeded};
use sdk_router::{BeforeExecutionRequest, PolicyRouter};
use std::sync::Arc;
use std::time::Instant;

/// What a fetch attempt produced, from the policy layer's point of view.
#[derive(Debug, Clone)]
pub enum FetchError {
    Execution(ExecutionFailure),
    Aborted(Reason),
    /// The per-call retry cap (`sdk-interceptor`'s livelock guard) was hit.
    RetryLimitExceeded,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Execution(failure) => write!(f, "{failure}"),
            FetchError::Aborted(reason) => write!(f, "{reason}"),
            FetchError::RetryLimitExceeded => f.write_str("retry limit exceeded"),
        }
    }
}

pub type FetchOutcome = Result<HttpResponse, FetchError>;

impl RetryLimitExceeded for FetchOutcome {
    fn retry_limit_exceeded() -> Self {
        Err(FetchError::RetryLimitExceeded)
    }
}

#[derive(Clone)]
pub struct FetchArgs {
    pub url: String,
    pub options: RequestOptions,
}

/// Default cap on extra `pre → call → post` cycles a single `fetch()` call
/// will run before surfacing `RetryLimitExceeded`, per spec.md §4.4. Actual
/// retry decisions are bounded first by the policy's own
/// `maxContiguousRetries`; this is strictly the livelock backstop.
pub const DEFAULT_RETRY_CAP: u32 = 64;

fn programmer_error_aborted(err: sdk_core::ProgrammerError) -> FetchError {
    FetchError::Aborted(Reason::new(err.to_string()))
}

/// Wraps one use case's HTTP attempts in the `pre-fetch`/`post-fetch` cycle,
/// consulting `router` on every attempt.
pub struct FetchExecutor {
    transport: Arc<dyn HttpTransport>,
    router: Arc<PolicyRouter>,
    events: EventEngine<FetchArgs, FetchOutcome>,
    retry_cap: u32,
}

impl FetchExecutor {
    pub async fn new(transport: Arc<dyn HttpTransport>, router: Arc<PolicyRouter>) -> Self {
        let events: EventEngine<FetchArgs, FetchOutcome> = EventEngine::new();

        let pre_router = router.clone();
        events
            .on_pre(1, None, move |ctx: EventContext, mut args: FetchArgs| {
                let router = pre_router.clone();
                async move {
                    let Some(invocation) = ctx.extra::<InvocationState>() else {
                        return PreResolution::Continue;
                    };

                    let event = ExecutionEvent::with_registry_cache_age(
                        Instant::now(),
                        invocation.registry_cache_age,
                    );
                    let check_failover_restore = invocation.take_first_attempt();

                    let resolution = router
                        .before_execution(BeforeExecutionRequest {
                            event,
                            check_failover_restore,
                        })
                        .await;

                    match resolution {
                        Ok(BeforeResolution::Continue { timeout }) => {
                            args.options.timeout = timeout;
                            PreResolution::Modify(args)
                        }
                        Ok(BeforeResolution::Backoff { backoff, timeout }) => {
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = invocation.cancellation.cancelled() => {
                                    return PreResolution::Abort(Err(FetchError::Aborted(
                                        Reason::new("cancelled during backoff"),
                                    )));
                                }
                            }
                            args.options.timeout = timeout;
                            PreResolution::Modify(args)
                        }
                        Ok(BeforeResolution::Abort { reason }) => {
                            PreResolution::Abort(Err(FetchError::Aborted(reason)))
                        }
                        Ok(BeforeResolution::SwitchProvider { provider, reason }) => {
                            invocation.queue_action(QueuedAction::SwitchProvider {
                                provider,
                                reason: reason.clone(),
                            });
                            PreResolution::Abort(Err(FetchError::Aborted(reason)))
                        }
                        Err(programmer_error) => {
                            PreResolution::Abort(Err(programmer_error_aborted(programmer_error)))
                        }
                    }
                }
            })
            .await;

        let post_router = router.clone();
        events
            .on_post(1, None, move |ctx: EventContext, result: FetchOutcome| {
                let router = post_router.clone();
                async move {
                    let Some(invocation) = ctx.extra::<InvocationState>() else {
                        return PostResolution::Continue;
                    };
                    if invocation.has_pending_action() {
                        // Already redirected in pre-fetch; post-perform acts on it.
                        return PostResolution::Continue;
                    }

                    let event = ExecutionEvent::with_registry_cache_age(
                        Instant::now(),
                        invocation.registry_cache_age,
                    );

                    match result {
                        Ok(_) => match router.after_success(&event).await {
                            Ok(_) => PostResolution::Continue,
                            Err(programmer_error) => {
                                PostResolution::Abort(Err(programmer_error_aborted(programmer_error)))
                            }
                        },
                        Err(FetchError::Execution(failure)) => {
                            match router.after_failure(&event, &failure).await {
                                Ok(AfterFailureResolution::Retry) => PostResolution::Retry,
                                Ok(AfterFailureResolution::Abort { reason }) => {
                                    PostResolution::Abort(Err(FetchError::Aborted(reason)))
                                }
                                Ok(AfterFailureResolution::SwitchProvider { provider, reason }) => {
                                    invocation.queue_action(QueuedAction::SwitchProvider {
                                        provider,
                                        reason: reason.clone(),
                                    });
                                    PostResolution::Abort(Err(FetchError::Aborted(reason)))
                                }
                                Err(programmer_error) => PostResolution::Abort(Err(
                                    programmer_error_aborted(programmer_error),
                                )),
                            }
                        }
                        // Already terminal: an abort (from pre-fetch or a prior
                        // post-handler) or the retry-cap sentinel.
                        Err(_) => PostResolution::Continue,
                    }
                }
            })
            .await;

        Self {
            transport,
            router,
            events,
            retry_cap: DEFAULT_RETRY_CAP,
        }
    }

    pub fn with_retry_cap(mut self, retry_cap: u32) -> Self {
        self.retry_cap = retry_cap;
        self
    }

    /// The event engine backing `pre-fetch`/`post-fetch`, exposed so callers
    /// can register additional handlers (logging, metrics) alongside the
    /// built-in router adapter, which always runs first at priority 1.
    pub fn events(&self) -> &EventEngine<FetchArgs, FetchOutcome> {
        &self.events
    }

    /// Issues one logical HTTP request, looping internally on `retry`
    /// resolutions from the router until a terminal outcome is reached or
    /// the retry cap trips.
    pub async fn fetch(
        &self,
        url: String,
        options: RequestOptions,
        invocation: Arc<InvocationState>,
    ) -> FetchOutcome {
        let ctx = EventContext {
            usecase: Some(invocation.use_case.use_case_name.clone()),
            profile: Some(invocation.use_case.profile_id.clone()),
            provider: self.router.get_current_provider().await,
            ..EventContext::default()
        }
        .with_extra(invocation);

        let args = FetchArgs { url, options };
        let transport = self.transport.clone();

        self.events
            .dispatch(ctx, args, self.retry_cap, move |_ctx, args: FetchArgs| {
                let transport = transport.clone();
                async move {
                    match transport.fetch(args.url, args.options).await {
                        Ok(response) => match classify_status(response.status_code) {
                            None => Ok(response),
                            Some(failure) => Err(FetchError::Execution(failure)),
                        },
                        Err(transport_failure) => {
                            Err(FetchError::Execution(ExecutionFailure::from(transport_failure)))
                        }
                    }
                }
            })
            .await
    }
}
