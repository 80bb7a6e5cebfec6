//! Single-flight bound-provider cache with TTL.
//!
//! Grounded on `tower-resilience-cache::store::CacheStore` (TTL-on-lookup via
//! `Instant`), generalized from a synchronous LRU/LFU/FIFO map into an async
//! single-flight map: concurrent `get` calls for a missing key observe the
//! same in-flight initialization and receive the same artifact once it
//! resolves (invariant 5 — no partially-initialized entry is ever observable).

use sdk_core::CacheKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

/// A shared, cloneable error: initialization failures are broadcast to every
/// waiter, not just the caller that happened to win the race to initialize.
#[derive(Debug, Clone)]
pub struct SharedInitError(Arc<str>);

impl SharedInitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(Arc::from(message.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SharedInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SharedInitError {}

type InitResult<T> = Result<Arc<T>, SharedInitError>;

enum Slot<T> {
    Ready {
        artifact: Arc<T>,
        expires_at: Instant,
    },
    /// An initialization is in flight. Queued callers await the receiver;
    /// `None` means still pending, `Some` is the outcome the initializer
    /// eventually produced.
    Pending(watch::Receiver<Option<InitResult<T>>>),
}

/// Keyed map of either a ready bound artifact or a pending initialization,
/// per spec §9's "keyed map of either a ready value or a pending handle that
/// queued callers await" design note.
pub struct BoundProviderCache<T> {
    entries: Mutex<HashMap<CacheKey, Slot<T>>>,
}

impl<T> Default for BoundProviderCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Send + Sync + 'static> BoundProviderCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached artifact for `key`, or runs `init` to produce one.
    ///
    /// `init` is invoked at most once while no cached (or in-flight) value
    /// exists for `key`; concurrent callers that arrive while it is running
    /// join the same in-flight future and all observe its outcome. On
    /// failure the key is removed before any waiter is notified, so the next
    /// `get` retries rather than replaying a cached error.
    pub async fn get<F, Fut>(&self, key: CacheKey, ttl: Duration, init: F) -> InitResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SharedInitError>>,
    {
        let sender = {
            let mut entries = self.entries.lock().await;
            match entries.get(&key) {
                Some(Slot::Ready {
                    artifact,
                    expires_at,
                }) if Instant::now() < *expires_at => return Ok(artifact.clone()),
                Some(Slot::Ready { .. }) => {
                    entries.remove(&key);
                }
                Some(Slot::Pending(receiver)) => {
                    let receiver = receiver.clone();
                    drop(entries);
                    return Self::await_pending(receiver).await;
                }
                None => {}
            }

            let (sender, receiver) = watch::channel(None);
            entries.insert(key.clone(), Slot::Pending(receiver));
            sender
        };

        // `init` runs outside the lock: only one caller ever reaches here
        // for a given key, since every later arrival observed `Slot::Pending`.
        let outcome = init().await.map(Arc::new);

        {
            let mut entries = self.entries.lock().await;
            match &outcome {
                Ok(artifact) => {
                    entries.insert(
                        key,
                        Slot::Ready {
                            artifact: artifact.clone(),
                            expires_at: Instant::now() + ttl,
                        },
                    );
                }
                Err(_) => {
                    entries.remove(&key);
                }
            }
        }

        let _ = sender.send(Some(outcome.clone()));
        outcome
    }

    /// Removes the cached entry for `key`, if any. A pending initialization
    /// in flight is left to complete; its result is simply not retained.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.lock().await.remove(key);
    }

    async fn await_pending(mut receiver: watch::Receiver<Option<InitResult<T>>>) -> InitResult<T> {
        loop {
            if let Some(outcome) = receiver.borrow().clone() {
                return outcome;
            }
            if receiver.changed().await.is_err() {
                return Err(SharedInitError::new(
                    "bound-provider cache initializer dropped without reporting an outcome",
                ));
            }
        }
    }
}
