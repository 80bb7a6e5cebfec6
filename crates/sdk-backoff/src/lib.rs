//! Backoff generators.
//!
//! A backoff holds a scalar delay `current`. `up()` raises it toward a
//! maximum, `down()` lowers it toward a minimum, `reset()` returns it to its
//! initial value. Any implementation must satisfy:
//!
//! - `current()` is non-negative;
//! - `up()` is non-decreasing;
//! - `down()` is non-increasing;
//! - `down()` after a matching `up()` returns to the previous value.
//!
//! [`ExponentialBackoff`] is the canonical implementation. The clamped-scalar-
//! behind-interior-mutability shape follows the resilience core's AIMD
//! controller, retargeted from AIMD's `on_success`/`on_failure` contract to
//! this crate's `up`/`down`/`reset` contract — `Duration` isn't atomic the way
//! `usize` is, so the scalar is held behind a `Mutex` rather than an
//! `AtomicUsize`.

use std::sync::Mutex;
use std::time::Duration;

/// A stateful, monotone scalar delay generator.
///
/// Object-safe so a policy can hold `Box<dyn Backoff>` without committing to a
/// concrete generator.
pub trait Backoff: Send + Sync {
    /// The current delay value.
    fn current(&self) -> Duration;
    /// Raises the delay toward the configured maximum.
    fn up(&self);
    /// Lowers the delay toward the configured minimum.
    fn down(&self);
    /// Returns the delay to its initial value.
    fn reset(&self);
}

/// Multiplies/divides the current delay by `factor` on each `up`/`down` call,
/// clamped to `[min, max]`.
pub struct ExponentialBackoff {
    start: Duration,
    factor: f64,
    min: Duration,
    max: Duration,
    current: Mutex<Duration>,
}

impl ExponentialBackoff {
    /// `factor` defaults to 2.0, `min` to `start`, `max` to effectively
    /// unbounded, matching the canonical `ExponentialBackoff(start, factor =
    /// 2.0, min = start, max = ∞)` contract.
    pub fn new(start: Duration) -> Self {
        Self {
            start,
            factor: 2.0,
            min: start,
            max: Duration::MAX,
            current: Mutex::new(start),
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_min(mut self, min: Duration) -> Self {
        self.min = min;
        self
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }
}

impl Backoff for ExponentialBackoff {
    fn current(&self) -> Duration {
        *self.current.lock().expect("backoff mutex poisoned")
    }

    fn up(&self) {
        let mut current = self.current.lock().expect("backoff mutex poisoned");
        let raised = current.mul_f64(self.factor);
        *current = raised.clamp(self.min, self.max);
    }

    fn down(&self) {
        let mut current = self.current.lock().expect("backoff mutex poisoned");
        let lowered = current.div_f64(self.factor);
        *current = lowered.clamp(self.min, self.max);
    }

    fn reset(&self) {
        *self.current.lock().expect("backoff mutex poisoned") = self.start;
    }
}
