//! Property test for `BoundProviderCache`.
//!
//! P6: for concurrent `get(cacheKey, init)` calls racing against an empty
//! cache entry, `init` runs at most once and every caller observes the same
//! artifact.

use proptest::prelude::*;
use sdk_core::CacheKey;
use sdk_runtime::BoundProviderCache;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn concurrent_misses_single_flight_into_one_initialization(concurrent_callers in 2usize..30) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let cache: Arc<BoundProviderCache<u32>> = Arc::new(BoundProviderCache::new());
            let init_calls = Arc::new(AtomicU32::new(0));
            let key = CacheKey::from_parts("profile", "provider");

            let mut handles = Vec::with_capacity(concurrent_callers);
            for _ in 0..concurrent_callers {
                let cache = cache.clone();
                let init_calls = init_calls.clone();
                let key = key.clone();
                handles.push(tokio::spawn(async move {
                    cache
                        .get(key, Duration::from_secs(60), || {
                            let init_calls = init_calls.clone();
                            async move {
                                init_calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(5)).await;
                                Ok::<_, sdk_runtime::SharedInitError>(42u32)
                            }
                        })
                        .await
                }));
            }

            let mut artifacts = Vec::with_capacity(concurrent_callers);
            for handle in handles {
                artifacts.push(handle.await.unwrap().unwrap());
            }

            prop_assert_eq!(init_calls.load(Ordering::SeqCst), 1);
            prop_assert!(artifacts.iter().all(|artifact| **artifact == 42));
            prop_assert!(artifacts.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));

            Ok(())
        })?;
    }
}
