//! `OneClient`: the facade that turns a parsed [`SuperConfig`] into routers,
//! policies, and a [`PerformDriver`] per `(profile, use case)`, lazily and
//! once, the first time each is actually performed against.

use crate::config::{ProfileConfig, RetryPolicyKind, SuperConfig};
use crate::env::SdkEnv;
use sdk_backoff::ExponentialBackoff;
use sdk_core::UseCaseId;
use sdk_policy::{AbortPolicy, CircuitBreakerConfig, CircuitBreakerPolicy, FailurePolicy};
use sdk_router::PolicyRouter;
use sdk_runtime::{Binder, BoundArtifact, FetchExecutor, HttpTransport, PerformDriver, PerformError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Per-call overrides. `provider`, if set, pins this invocation to that
/// provider and disables failover for it alone (spec.md §4.5 step 2).
#[derive(Default)]
pub struct PerformOptions {
    pub provider: Option<String>,
    pub cancellation: Option<CancellationToken>,
}

fn build_policy(profile: &ProfileConfig, provider: &str, use_case_name: &str) -> Arc<dyn FailurePolicy> {
    let retry_policy = profile.retry_policy_for(provider, use_case_name);
    match retry_policy.kind {
        RetryPolicyKind::None => Arc::new(AbortPolicy::new()),
        RetryPolicyKind::CircuitBreaker => {
            let backoff = ExponentialBackoff::new(retry_policy.backoff.start())
                .with_factor(retry_policy.backoff.factor);
            let config = CircuitBreakerConfig::builder()
                .failure_threshold(retry_policy.max_contiguous_retries.max(1))
                .reset_timeout(retry_policy.reset_timeout())
                .request_timeout(retry_policy.request_timeout())
                .backoff(Box::new(backoff))
                .build();
            Arc::new(CircuitBreakerPolicy::new(config))
        }
    }
}

/// Default bound-provider cache TTL when `SUPERFACE_CACHE_TIMEOUT` is unset.
/// Spec.md leaves the default unspecified; five minutes matches the
/// teacher's own circuit breaker `resetTimeout` order of magnitude.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// The public entry point: one client per parsed configuration, shared across
/// every profile and use case it declares.
///
/// `A` is the bound artifact type the caller's profile provider binder
/// produces; this crate never names it concretely (spec.md §4.5: "opaque to
/// this spec").
pub struct OneClient<A: BoundArtifact + 'static> {
    config: SuperConfig,
    transport: Arc<dyn HttpTransport>,
    bind: Binder<A>,
    cache_ttl: Duration,
    drivers: Mutex<HashMap<(String, String), Arc<PerformDriver<A>>>>,
}

impl<A: BoundArtifact + 'static> OneClient<A> {
    pub fn new(
        config: SuperConfig,
        env: &SdkEnv,
        transport: Arc<dyn HttpTransport>,
        bind: Binder<A>,
    ) -> Self {
        let cache_ttl = env.cache_ttl_or(DEFAULT_CACHE_TTL);
        Self {
            config,
            transport,
            bind,
            cache_ttl,
            drivers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn perform(
        &self,
        profile_id: &str,
        use_case_name: &str,
        input: serde_json::Value,
        options: PerformOptions,
    ) -> Result<serde_json::Value, PerformError> {
        let driver = self.driver_for(profile_id, use_case_name).await?;
        driver
            .perform(
                options.provider,
                use_case_name.to_string(),
                input,
                options.cancellation.unwrap_or_else(CancellationToken::new),
            )
            .await
    }

    async fn driver_for(
        &self,
        profile_id: &str,
        use_case_name: &str,
    ) -> Result<Arc<PerformDriver<A>>, PerformError> {
        let key = (profile_id.to_string(), use_case_name.to_string());
        let mut drivers = self.drivers.lock().await;
        if let Some(driver) = drivers.get(&key) {
            return Ok(driver.clone());
        }

        let profile = self
            .config
            .profiles
            .get(profile_id)
            .ok_or_else(|| PerformError::Unexpected(format!("unknown profile: {profile_id}")))?
            .clone();

        if profile.priority.is_empty() {
            return Err(PerformError::Unexpected(format!(
                "profile {profile_id} declares no provider priority"
            )));
        }

        let iteration_cap = profile
            .priority
            .iter()
            .map(|provider| {
                profile
                    .retry_policy_for(provider, use_case_name)
                    .max_contiguous_retries
            })
            .max()
            .unwrap_or(5)
            .max(1);

        let priority = profile.priority.clone();
        let profile_for_policy = profile.clone();
        let use_case_for_policy = use_case_name.to_string();
        let router = Arc::new(PolicyRouter::new(priority, move |provider: &str| {
            build_policy(&profile_for_policy, provider, &use_case_for_policy)
        }));
        router
            .set_allow_failover(profile.provider_failover_for(use_case_name))
            .await;

        let fetcher = Arc::new(FetchExecutor::new(self.transport.clone(), router.clone()).await);

        let profile_cache_key = format!(
            "{profile_id}@{}",
            profile.version.as_deref().or(profile.file.as_deref()).unwrap_or("latest")
        );

        let driver = Arc::new(PerformDriver::new(
            UseCaseId::new(profile_id, use_case_name),
            profile_cache_key,
            self.cache_ttl,
            router,
            fetcher,
            self.bind.clone(),
            iteration_cap,
        ));

        drivers.insert(key, driver.clone());
        Ok(driver)
    }
}
