//! Environment variables recognized by the SDK, read once at client
//! construction rather than ad hoc from deep in the call stack, per spec.md §6.

use std::time::Duration;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_duration_ms(name: &str) -> Option<Duration> {
    env_var(name)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn env_bool(name: &str) -> Option<bool> {
    env_var(name).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Resolved values of every environment variable spec.md §6 names. Populated
/// once via [`SdkEnv::from_process_env`]; nothing downstream re-reads
/// `std::env` directly.
#[derive(Debug, Clone, Default)]
pub struct SdkEnv {
    pub sdk_token: Option<String>,
    pub api_url: Option<String>,
    pub path: Option<String>,
    pub metric_debounce_time_min: Option<Duration>,
    pub metric_debounce_time_max: Option<Duration>,
    pub disable_metric_reporting: bool,
    pub sandbox_timeout: Option<Duration>,
    pub cache_timeout: Option<Duration>,
}

impl SdkEnv {
    pub fn from_process_env() -> Self {
        Self {
            sdk_token: env_var("SUPERFACE_SDK_TOKEN"),
            api_url: env_var("SUPERFACE_API_URL"),
            path: env_var("SUPERFACE_PATH"),
            metric_debounce_time_min: env_duration_ms("SUPERFACE_METRIC_DEBOUNCE_TIME_MIN"),
            metric_debounce_time_max: env_duration_ms("SUPERFACE_METRIC_DEBOUNCE_TIME_MAX"),
            disable_metric_reporting: env_bool("SUPERFACE_DISABLE_METRIC_REPORTING").unwrap_or(false),
            sandbox_timeout: env_duration_ms("SUPERFACE_SANDBOX_TIMEOUT"),
            cache_timeout: env_duration_ms("SUPERFACE_CACHE_TIMEOUT"),
        }
    }

    /// The bound-provider cache TTL this environment implies, falling back to
    /// `default` (the caller's own choice, since spec.md leaves the default
    /// unspecified) when `SUPERFACE_CACHE_TIMEOUT` is unset.
    pub fn cache_ttl_or(&self, default: Duration) -> Duration {
        self.cache_timeout.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // std::env is process-global; serialize these tests to avoid cross-test
    // interference with other tests touching the same variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn reads_recognized_variables() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("SUPERFACE_SDK_TOKEN", "tok");
        std::env::set_var("SUPERFACE_CACHE_TIMEOUT", "5000");
        std::env::set_var("SUPERFACE_DISABLE_METRIC_REPORTING", "true");

        let env = SdkEnv::from_process_env();
        assert_eq!(env.sdk_token.as_deref(), Some("tok"));
        assert_eq!(env.cache_timeout, Some(Duration::from_millis(5000)));
        assert!(env.disable_metric_reporting);

        std::env::remove_var("SUPERFACE_SDK_TOKEN");
        std::env::remove_var("SUPERFACE_CACHE_TIMEOUT");
        std::env::remove_var("SUPERFACE_DISABLE_METRIC_REPORTING");
    }

    #[test]
    fn unset_variables_resolve_to_none_or_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SUPERFACE_API_URL");
        let env = SdkEnv::from_process_env();
        assert_eq!(env.api_url, None);
        assert!(!env.disable_metric_reporting);
        assert_eq!(env.cache_ttl_or(Duration::from_secs(60)), Duration::from_secs(60));
    }
}
