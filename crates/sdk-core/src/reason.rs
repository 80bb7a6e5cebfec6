//! A composable abort/failure reason string.
//!
//! Several layers prefix context onto a reason as it propagates outward — the
//! router prefixing "No backup provider available" onto a policy's own abort
//! reason, for instance. `Reason` makes that composition explicit instead of
//! ad hoc string concatenation at each call site.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason(String);

impl Reason {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Prepends `prefix` ahead of the existing message, separated by ": ".
    ///
    /// `router.beforeExecution` composes a policy's own abort reason this way
    /// when failover finds no working provider.
    pub fn add_prefix(self, prefix: &str) -> Self {
        Self(format!("{prefix}: {}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Reason {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_prefix_composes_outward() {
        let reason = Reason::new("Max (5) retries exceeded")
            .add_prefix("No backup provider available");
        assert_eq!(
            reason.as_str(),
            "No backup provider available: Max (5) retries exceeded"
        );
    }
}
