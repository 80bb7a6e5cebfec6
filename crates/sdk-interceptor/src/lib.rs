//! Priority-ordered event interceptor engine.
//!
//! The source modeled each interceptable call site as a class method wearing
//! an `@interceptor(eventName)` decorator. There is no equivalent language
//! feature here, so per spec.md's own design note every decorated call site
//! becomes an explicit [`EventEngine::dispatch`] call: emit `pre-<event>`,
//! invoke the wrapped operation (unless a pre-handler already produced a
//! result), emit `post-<event>`, and loop once more if a post-handler asked
//! for a retry. `sdk-core::events` remains the simple fire-and-forget
//! broadcast used for the three terminal events (`success`, `failure`,
//! `provider-switch`); this crate is for the four paired pre/post events that
//! can steer the call in progress.

use futures::future::BoxFuture;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// The typed context every handler sees alongside its event's own payload.
///
/// `extra` is an escape hatch for state that belongs to one call of a
/// wrapped operation rather than to the handler registry itself — e.g. the
/// perform driver's per-invocation bookkeeping. The registry is long-lived
/// and shared across concurrent calls; `extra` is what lets each call's
/// handlers see call-scoped state without the registry knowing its type,
/// the same role `http::Extensions`/tower's `Extensions` play.
#[derive(Clone, Default)]
pub struct EventContext {
    pub profile: Option<String>,
    pub usecase: Option<String>,
    pub provider: Option<String>,
    pub extra: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("profile", &self.profile)
            .field("usecase", &self.usecase)
            .field("provider", &self.provider)
            .field("extra", &self.extra.as_ref().map(|_| ".."))
            .finish()
    }
}

impl EventContext {
    pub fn now() -> (Self, Instant) {
        (Self::default(), Instant::now())
    }

    pub fn with_extra<T: Any + Send + Sync>(mut self, extra: Arc<T>) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Downcasts `extra` back to `T`, if it was set and is actually a `T`.
    pub fn extra<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.extra.clone()?.downcast::<T>().ok()
    }
}

/// What a pre-handler decided.
pub enum PreResolution<Args, Output> {
    /// No change; run the next handler.
    Continue,
    /// Future handlers and the wrapped call see `Args` instead.
    Modify(Args),
    /// Short-circuit: skip the wrapped call and every remaining pre-handler,
    /// jumping straight to the post phase with this result.
    Abort(Output),
}

/// What a post-handler decided.
pub enum PostResolution<Output> {
    /// No change; run the next handler.
    Continue,
    /// Re-run the whole pre → call → post cycle for this wrapped op.
    Retry,
    /// Short-circuit: downstream sees this result instead.
    Abort(Output),
}

/// Lets [`EventEngine::dispatch`] manufacture the "retry limit exceeded"
/// outcome without knowing anything else about `Output`. Every result type an
/// engine is instantiated over implements this once.
pub trait RetryLimitExceeded {
    fn retry_limit_exceeded() -> Self;
}

pub type Filter = Arc<dyn Fn(&EventContext) -> bool + Send + Sync>;
type PreFn<Args, Output> =
    Arc<dyn Fn(EventContext, Args) -> BoxFuture<'static, PreResolution<Args, Output>> + Send + Sync>;
type PostFn<Output> =
    Arc<dyn Fn(EventContext, Output) -> BoxFuture<'static, PostResolution<Output>> + Send + Sync>;

/// A registered handler's identity, returned by `on_pre`/`on_post` so it can
/// later be removed with `off_pre`/`off_post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration<F> {
    id: HandlerId,
    priority: i32,
    seq: u64,
    filter: Option<Filter>,
    handler: F,
}

fn ordered<F>(mut handlers: Vec<&Registration<F>>) -> Vec<&Registration<F>> {
    handlers.sort_by_key(|h| (h.priority, h.seq));
    handlers
}

/// Priority-ordered pre/post dispatcher for one named event pair (e.g.
/// `pre-fetch`/`post-fetch`). Registration takes a write-lock; dispatch reads
/// the handler lists under a read-lock and never holds it while a handler
/// runs, per spec.md §4.4's concurrency rule.
pub struct EventEngine<Args, Output> {
    pre: RwLock<Vec<Registration<PreFn<Args, Output>>>>,
    post: RwLock<Vec<Registration<PostFn<Output>>>>,
    next_id: AtomicU64,
}

impl<Args, Output> Default for EventEngine<Args, Output> {
    fn default() -> Self {
        Self {
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<Args, Output> EventEngine<Args, Output>
where
    Args: Clone + Send + Sync + 'static,
    Output: Clone + Send + Sync + RetryLimitExceeded + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> (HandlerId, u64) {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        (HandlerId(n), n)
    }

    /// Registers a pre-handler. Lower `priority` fires first; ties break by
    /// registration order.
    pub async fn on_pre<H, Fut>(&self, priority: i32, filter: Option<Filter>, handler: H) -> HandlerId
    where
        H: Fn(EventContext, Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = PreResolution<Args, Output>> + Send + 'static,
    {
        let (id, seq) = self.next_seq();
        let handler: PreFn<Args, Output> = Arc::new(move |ctx, args| Box::pin(handler(ctx, args)));
        self.pre.write().await.push(Registration {
            id,
            priority,
            seq,
            filter,
            handler,
        });
        id
    }

    /// Registers a post-handler. Same ordering rule as `on_pre`.
    pub async fn on_post<H, Fut>(&self, priority: i32, filter: Option<Filter>, handler: H) -> HandlerId
    where
        H: Fn(EventContext, Output) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = PostResolution<Output>> + Send + 'static,
    {
        let (id, seq) = self.next_seq();
        let handler: PostFn<Output> = Arc::new(move |ctx, out| Box::pin(handler(ctx, out)));
        self.post.write().await.push(Registration {
            id,
            priority,
            seq,
            filter,
            handler,
        });
        id
    }

    pub async fn off_pre(&self, id: HandlerId) {
        self.pre.write().await.retain(|r| r.id != id);
    }

    pub async fn off_post(&self, id: HandlerId) {
        self.post.write().await.retain(|r| r.id != id);
    }

    /// Runs one pre → call → post cycle, looping again for each `retry` a
    /// post-handler returns, up to `retry_cap` extra cycles. Exceeding the
    /// cap surfaces as `Output::retry_limit_exceeded()` rather than looping
    /// forever — the livelock guard spec.md §4.4 requires.
    pub async fn dispatch<C, Fut>(
        &self,
        ctx: EventContext,
        args: Args,
        retry_cap: u32,
        call: C,
    ) -> Output
    where
        C: Fn(EventContext, Args) -> Fut,
        Fut: std::future::Future<Output = Output>,
    {
        let mut current_args = args;
        let mut cycles = 0u32;

        loop {
            let (result, args_seen_by_call) = self.run_pre_then_call(&ctx, current_args, &call).await;

            let (final_result, retry_requested) = self.run_post(&ctx, result).await;

            if !retry_requested {
                return final_result;
            }

            cycles += 1;
            if cycles > retry_cap {
                #[cfg(feature = "tracing")]
                tracing::warn!(retry_cap, "event retry cap exceeded");
                return Output::retry_limit_exceeded();
            }
            current_args = args_seen_by_call;
        }
    }

    async fn run_pre_then_call<C, Fut>(
        &self,
        ctx: &EventContext,
        args: Args,
        call: &C,
    ) -> (Output, Args)
    where
        C: Fn(EventContext, Args) -> Fut,
        Fut: std::future::Future<Output = Output>,
    {
        let mut current_args = args;
        let mut aborted = None;

        {
            let handlers = self.pre.read().await;
            for registration in ordered(handlers.iter().collect()) {
                if let Some(filter) = &registration.filter {
                    if !filter(ctx) {
                        continue;
                    }
                }
                match (registration.handler)(ctx.clone(), current_args.clone()).await {
                    PreResolution::Continue => {}
                    PreResolution::Modify(new_args) => current_args = new_args,
                    PreResolution::Abort(output) => {
                        aborted = Some(output);
                        break;
                    }
                }
            }
        }

        match aborted {
            Some(output) => (output, current_args),
            None => {
                let output = call(ctx.clone(), current_args.clone()).await;
                (output, current_args)
            }
        }
    }

    async fn run_post(&self, ctx: &EventContext, result: Output) -> (Output, bool) {
        let mut result = result;
        {
            let handlers = self.post.read().await;
            for registration in ordered(handlers.iter().collect()) {
                if let Some(filter) = &registration.filter {
                    if !filter(ctx) {
                        continue;
                    }
                }
                match (registration.handler)(ctx.clone(), result.clone()).await {
                    PostResolution::Continue => {}
                    PostResolution::Retry => return (result, true),
                    PostResolution::Abort(output) => {
                        result = output;
                        break;
                    }
                }
            }
        }
        (result, false)
    }
}
