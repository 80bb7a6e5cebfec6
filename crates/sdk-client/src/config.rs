//! The parsed "super" configuration shape consumed (not defined) by this crate.
//!
//! Parsing `super.json` itself — resolving `version`/`file` references, walking
//! the filesystem for a profile's AST — is out of scope; what lands here is
//! already a structured object, per spec.md §6. These are plain
//! `serde::Deserialize` structs mirroring that shape field-for-field.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

fn default_max_contiguous_retries() -> u32 {
    5
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

fn default_backoff_start_ms() -> u64 {
    2_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_provider_failover() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_start_ms")]
    pub start_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            start_ms: default_backoff_start_ms(),
            factor: default_backoff_factor(),
        }
    }
}

impl BackoffConfig {
    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPolicyKind {
    None,
    CircuitBreaker,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicyConfig {
    pub kind: RetryPolicyKind,
    #[serde(default = "default_max_contiguous_retries")]
    pub max_contiguous_retries: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl RetryPolicyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            kind: RetryPolicyKind::None,
            max_contiguous_retries: default_max_contiguous_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            reset_timeout_ms: default_reset_timeout_ms(),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseDefaults {
    #[serde(default = "default_provider_failover")]
    pub provider_failover: bool,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicyConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUseCaseDefaults {
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicyConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub defaults: HashMap<String, ProviderUseCaseDefaults>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    pub priority: Vec<String>,
    #[serde(default)]
    pub defaults: HashMap<String, UseCaseDefaults>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl ProfileConfig {
    /// A provider's effective retry policy for a use case: the provider's own
    /// override if present, otherwise the profile-level use-case default,
    /// otherwise `RetryPolicyConfig::default()` (`AbortPolicy`).
    pub fn retry_policy_for(&self, provider: &str, use_case_name: &str) -> RetryPolicyConfig {
        if let Some(provider_defaults) = self
            .providers
            .get(provider)
            .and_then(|p| p.defaults.get(use_case_name))
        {
            if let Some(retry_policy) = &provider_defaults.retry_policy {
                return retry_policy.clone();
            }
        }
        self.defaults
            .get(use_case_name)
            .and_then(|d| d.retry_policy.clone())
            .unwrap_or_default()
    }

    pub fn provider_failover_for(&self, use_case_name: &str) -> bool {
        self.defaults
            .get(use_case_name)
            .map(|d| d.provider_failover)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSecurityConfig {
    #[serde(default)]
    pub security: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuperConfig {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderSecurityConfig>,
}
