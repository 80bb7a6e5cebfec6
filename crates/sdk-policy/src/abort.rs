use crate::{FailurePolicy, DEFAULT_REQUEST_TIMEOUT};
use sdk_core::{
    AfterFailureResolution, AfterSuccessResolution, BeforeResolution, ExecutionEvent,
    ExecutionFailure, ProgrammerError, Reason,
};
use std::time::Duration;

/// Stateless policy that never retries: the first failure is terminal.
pub struct AbortPolicy {
    request_timeout: Duration,
}

impl AbortPolicy {
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for AbortPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl FailurePolicy for AbortPolicy {
    fn before_execution(
        &self,
        _info: &ExecutionEvent,
    ) -> Result<BeforeResolution, ProgrammerError> {
        Ok(BeforeResolution::Continue {
            timeout: self.request_timeout,
        })
    }

    fn after_success(
        &self,
        _info: &ExecutionEvent,
    ) -> Result<AfterSuccessResolution, ProgrammerError> {
        Ok(AfterSuccessResolution::Continue)
    }

    fn after_failure(
        &self,
        _info: &ExecutionEvent,
        failure: &ExecutionFailure,
    ) -> Result<AfterFailureResolution, ProgrammerError> {
        Ok(AfterFailureResolution::Abort {
            reason: Reason::new(failure.to_string()),
        })
    }

    fn reset(&self) {}

    fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn is_abort_policy(&self) -> bool {
        true
    }
}
