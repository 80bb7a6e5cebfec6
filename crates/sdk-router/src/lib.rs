//! Per-(profile, use case) provider router.
//!
//! Each profile/use-case pair owns one [`PolicyRouter`]: a priority-ordered
//! list of provider names, a currently-selected provider, and a lazily
//! instantiated [`FailurePolicy`] per provider actually touched. The router
//! itself never decides retry/backoff/abort outcomes — it delegates to the
//! current provider's policy and only steps in to pick a *different*
//! provider, which is why `SwitchProvider` only ever originates here.

use sdk_core::{
    AfterFailureResolution, AfterSuccessResolution, BeforeResolution, ExecutionEvent,
    ExecutionFailure, ProgrammerError, Reason,
};
use sdk_policy::FailurePolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Request passed to [`PolicyRouter::before_execution`]. `check_failover_restore`
/// is set by the caller only on the first attempt of a use-case invocation —
/// restore is a "maybe we can go back to the preferred provider" check, not
/// something that makes sense mid-retry-loop.
pub struct BeforeExecutionRequest {
    pub event: ExecutionEvent,
    pub check_failover_restore: bool,
}

struct RouterState {
    current_provider: Option<String>,
    allow_failover: bool,
    providers_of_use_case: HashMap<String, Arc<dyn FailurePolicy>>,
}

/// Priority-based failover router for a single (profile, use case) pair.
///
/// `priority` is the provider order the profile declares, highest priority
/// first. `instantiate_policy` is a factory supplied by the caller (normally
/// closing over the use case's per-provider policy configuration) so the
/// router itself stays policy-agnostic.
pub struct PolicyRouter {
    instantiate_policy: Box<dyn Fn(&str) -> Arc<dyn FailurePolicy> + Send + Sync>,
    priority: Vec<String>,
    state: Mutex<RouterState>,
}

impl PolicyRouter {
    pub fn new(
        priority: Vec<String>,
        instantiate_policy: impl Fn(&str) -> Arc<dyn FailurePolicy> + Send + Sync + 'static,
    ) -> Self {
        let current_provider = priority.first().cloned();
        Self {
            instantiate_policy: Box::new(instantiate_policy),
            priority,
            state: Mutex::new(RouterState {
                current_provider,
                allow_failover: true,
                providers_of_use_case: HashMap::new(),
            }),
        }
    }

    /// Selects `provider` as the one the router currently delegates to,
    /// instantiating its policy if this is the first time it's seen.
    pub async fn set_current_provider(&self, provider: impl Into<String>) {
        let provider = provider.into();
        let mut state = self.state.lock().await;
        self.policy_for(&mut state, &provider);
        state.current_provider = Some(provider);
    }

    /// Default: `true`.
    pub async fn set_allow_failover(&self, allow_failover: bool) {
        self.state.lock().await.allow_failover = allow_failover;
    }

    pub async fn get_current_provider(&self) -> Option<String> {
        self.state.lock().await.current_provider.clone()
    }

    /// Returns the router to `priority[0]` and resets every policy it has
    /// instantiated so far. Policies for providers never touched are left
    /// uninstantiated — there is nothing to reset.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.current_provider = self.priority.first().cloned();
        for policy in state.providers_of_use_case.values() {
            policy.reset();
        }
    }

    /// Called exactly once per use-case invocation, before the first attempt.
    ///
    /// If `check_failover_restore` is set and failover is allowed, first
    /// looks for a strictly-higher-priority provider (excluding bare
    /// `AbortPolicy` providers, which can't signal health) that would
    /// currently continue; finding one switches back to it immediately.
    /// Otherwise delegates to the current provider's policy, and on abort
    /// searches strictly-lower-priority providers for one willing to
    /// continue before giving up.
    pub async fn before_execution(
        &self,
        request: BeforeExecutionRequest,
    ) -> Result<BeforeResolution, ProgrammerError> {
        let mut state = self.state.lock().await;
        let current = Self::current_provider_or_fail(&state, "router::before_execution")?;

        if request.check_failover_restore && state.allow_failover {
            if let Some(provider) = self.search(&mut state, &current, request.event, true)? {
                self.policy_for(&mut state, &current).reset();
                state.current_provider = Some(provider.clone());
                return Ok(BeforeResolution::SwitchProvider {
                    provider,
                    reason: Reason::new("Provider failover restore"),
                });
            }
        }

        let policy = self.policy_for(&mut state, &current);
        match policy.before_execution(&request.event)? {
            BeforeResolution::Abort { reason } => {
                if state.allow_failover {
                    if let Some(provider) = self.search(&mut state, &current, request.event, false)? {
                        self.policy_for(&mut state, &current).reset();
                        state.current_provider = Some(provider.clone());
                        return Ok(BeforeResolution::SwitchProvider {
                            reason: Reason::new(format!("Failover to {provider}")),
                            provider,
                        });
                    }
                }
                Ok(BeforeResolution::Abort {
                    reason: reason.add_prefix("No backup provider available"),
                })
            }
            other => Ok(other),
        }
    }

    pub async fn after_success(
        &self,
        event: &ExecutionEvent,
    ) -> Result<AfterSuccessResolution, ProgrammerError> {
        let mut state = self.state.lock().await;
        let current = Self::current_provider_or_fail(&state, "router::after_success")?;
        let policy = self.policy_for(&mut state, &current);
        policy.after_success(event)
    }

    /// Same failover logic as the abort branch of `before_execution`, but
    /// restore is never considered here: restore only runs at the start of
    /// an invocation, and this is the middle of one.
    pub async fn after_failure(
        &self,
        event: &ExecutionEvent,
        failure: &ExecutionFailure,
    ) -> Result<AfterFailureResolution, ProgrammerError> {
        let mut state = self.state.lock().await;
        let current = Self::current_provider_or_fail(&state, "router::after_failure")?;
        let policy = self.policy_for(&mut state, &current);

        match policy.after_failure(event, failure)? {
            AfterFailureResolution::Abort { reason } => {
                if state.allow_failover {
                    if let Some(provider) = self.search(&mut state, &current, *event, false)? {
                        self.policy_for(&mut state, &current).reset();
                        state.current_provider = Some(provider.clone());
                        return Ok(AfterFailureResolution::SwitchProvider {
                            reason: Reason::new(format!("Failover to {provider}")),
                            provider,
                        });
                    }
                }
                Ok(AfterFailureResolution::Abort {
                    reason: reason.add_prefix("No backup provider available"),
                })
            }
            other => Ok(other),
        }
    }

    fn current_provider_or_fail(
        state: &RouterState,
        location: &'static str,
    ) -> Result<String, ProgrammerError> {
        state
            .current_provider
            .clone()
            .ok_or_else(|| ProgrammerError::new(location, "currentProvider is unset"))
    }

    fn policy_for(&self, state: &mut RouterState, provider: &str) -> Arc<dyn FailurePolicy> {
        if let Some(policy) = state.providers_of_use_case.get(provider) {
            return policy.clone();
        }
        let policy = (self.instantiate_policy)(provider);
        state
            .providers_of_use_case
            .insert(provider.to_string(), policy.clone());
        policy
    }

    /// Searches the providers on the appropriate side of `current` in
    /// `priority` order for one whose `beforeExecution` returns `continue`.
    /// Per P5 and spec.md §4.3, only a clean `continue` qualifies — a
    /// candidate returning `backoff` is asking to sleep, not reporting
    /// itself fit to proceed, so it does not qualify either search.
    /// `restore == true` searches strictly-higher-priority providers and
    /// excludes bare `AbortPolicy` providers; `restore == false` searches
    /// strictly-lower-priority providers with no exclusion, since any
    /// provider willing to continue is better than none during failover.
    ///
    /// A provider that was selected only via `set_current_provider` and
    /// never appears in `priority` has no defined position, so it
    /// contributes no candidates on either side.
    fn search(
        &self,
        state: &mut RouterState,
        current: &str,
        event: ExecutionEvent,
        restore: bool,
    ) -> Result<Option<String>, ProgrammerError> {
        let candidates: Vec<String> = match self.priority.iter().position(|p| p == current) {
            Some(idx) if restore => self.priority[..idx].to_vec(),
            Some(idx) => self.priority[idx + 1..].to_vec(),
            None => Vec::new(),
        };

        for provider in candidates {
            let policy = self.policy_for(state, &provider);
            if restore && policy.is_abort_policy() {
                continue;
            }
            match policy.before_execution(&event)? {
                BeforeResolution::Continue { .. } => return Ok(Some(provider)),
                BeforeResolution::Backoff { .. }
                | BeforeResolution::Abort { .. }
                | BeforeResolution::SwitchProvider { .. } => continue,
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk_policy::AbortPolicy;
    use sdk_policy::{RetryConfig, RetryPolicy};
    use std::time::{Duration, Instant};

    fn event() -> ExecutionEvent {
        ExecutionEvent::with_registry_cache_age(Instant::now(), Duration::ZERO)
    }

    fn always_retry_policy(_: &str) -> Arc<dyn FailurePolicy> {
        Arc::new(RetryPolicy::new(
            RetryConfig::builder().max_contiguous_retries(5).build(),
        ))
    }

    fn abort_then_never(provider: &str) -> Arc<dyn FailurePolicy> {
        if provider == "a" {
            Arc::new(AbortPolicy::new())
        } else {
            Arc::new(RetryPolicy::new(
                RetryConfig::builder().max_contiguous_retries(5).build(),
            ))
        }
    }

    fn always_abort(_: &str) -> Arc<dyn FailurePolicy> {
        Arc::new(AbortPolicy::new())
    }

    #[tokio::test]
    async fn unset_current_provider_is_a_programmer_error() {
        let router = PolicyRouter::new(Vec::new(), always_retry_policy);
        let err = router
            .after_success(&event())
            .await
            .expect_err("router has no current provider and no priority list");
        assert_eq!(err.location, "router::after_success");
    }

    #[tokio::test]
    async fn reset_selects_the_highest_priority_provider() {
        let router = PolicyRouter::new(
            vec!["a".into(), "b".into()],
            always_retry_policy,
        );
        router.set_current_provider("b").await;
        router.reset().await;
        assert_eq!(router.get_current_provider().await, Some("a".into()));
    }

    /// After the current provider's policy aborts, the router fails over to
    /// the next lower-priority provider that would continue.
    #[tokio::test]
    async fn after_failure_abort_fails_over_to_a_lower_priority_provider() {
        let router = PolicyRouter::new(
            vec!["a".into(), "b".into()],
            abort_then_never,
        );
        let resolution = router
            .after_failure(&event(), &ExecutionFailure::Http(500))
            .await
            .unwrap();
        match resolution {
            AfterFailureResolution::SwitchProvider { provider, .. } => assert_eq!(provider, "b"),
            other => panic!("expected switch-provider, got {other:?}"),
        }
        assert_eq!(router.get_current_provider().await, Some("b".into()));
    }

    /// With no lower-priority provider left to try, the router's own
    /// "No backup provider available" prefix is composed onto the policy's
    /// abort reason.
    #[tokio::test]
    async fn after_failure_abort_with_no_backup_prefixes_the_reason() {
        let router = PolicyRouter::new(vec!["a".into()], abort_then_never);
        let resolution = router
            .after_failure(&event(), &ExecutionFailure::Http(500))
            .await
            .unwrap();
        match resolution {
            AfterFailureResolution::Abort { reason } => {
                assert!(reason.as_str().starts_with("No backup provider available"));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    /// P5: `beforeExecution` with `checkFailoverRestore = true` switches back
    /// to a strictly-higher-priority provider only if it is not guarded by a
    /// bare `AbortPolicy` and it currently reports `continue`.
    #[tokio::test]
    async fn before_execution_restores_to_a_healthy_higher_priority_provider() {
        let router = PolicyRouter::new(
            vec!["a".into(), "b".into()],
            always_retry_policy,
        );
        router.set_current_provider("b").await;

        let resolution = router
            .before_execution(BeforeExecutionRequest {
                event: event(),
                check_failover_restore: true,
            })
            .await
            .unwrap();

        match resolution {
            BeforeResolution::SwitchProvider { provider, reason } => {
                assert_eq!(provider, "a");
                assert_eq!(reason.as_str(), "Provider failover restore");
            }
            other => panic!("expected switch-provider, got {other:?}"),
        }
        assert_eq!(router.get_current_provider().await, Some("a".into()));
    }

    /// A higher-priority provider guarded only by `AbortPolicy` can never
    /// supply a failover-restore signal (it always reports `continue`
    /// trivially), so it is excluded from the restore search.
    #[tokio::test]
    async fn before_execution_restore_excludes_bare_abort_policy_providers() {
        let router = PolicyRouter::new(
            vec!["a".into(), "b".into()],
            abort_then_never,
        );
        router.set_current_provider("b").await;

        let resolution = router
            .before_execution(BeforeExecutionRequest {
                event: event(),
                check_failover_restore: true,
            })
            .await
            .unwrap();

        match resolution {
            BeforeResolution::Continue { .. } => {}
            other => panic!("expected continue (no restore candidate), got {other:?}"),
        }
        assert_eq!(router.get_current_provider().await, Some("b".into()));
    }

    #[tokio::test]
    async fn after_success_has_no_failover_side_effect() {
        let router = PolicyRouter::new(vec!["a".into(), "b".into()], always_retry_policy);
        router.after_success(&event()).await.unwrap();
        assert_eq!(router.get_current_provider().await, Some("a".into()));
    }

    /// A provider selected only via `set_current_provider`, never present in
    /// `priority`, has no defined position and so never participates in
    /// failover search in either direction.
    #[tokio::test]
    async fn provider_outside_priority_list_does_not_fail_over() {
        let router = PolicyRouter::new(vec!["a".into()], always_abort);
        router.set_current_provider("z").await;

        let resolution = router
            .after_failure(&event(), &ExecutionFailure::Http(500))
            .await
            .unwrap();
        match resolution {
            AfterFailureResolution::SwitchProvider { .. } => {
                panic!("provider outside the priority list should not be a failover target")
            }
            AfterFailureResolution::Abort { .. } => {}
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_allow_failover_false_disables_failover_search() {
        let router = PolicyRouter::new(vec!["a".into(), "b".into()], abort_then_never);
        router.set_allow_failover(false).await;

        let resolution = router
            .after_failure(&event(), &ExecutionFailure::Http(500))
            .await
            .unwrap();
        assert!(matches!(resolution, AfterFailureResolution::Abort { .. }));
        assert_eq!(router.get_current_provider().await, Some("a".into()));
    }
}
