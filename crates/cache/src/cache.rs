use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use execd_core::{constants::DEFAULT_CACHE_CAPACITY, Fingerprint, StoredResult};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// Per-fingerprint memoization of completed executions with at-most-one
/// concurrent computation per key.
///
/// Each entry is a `tokio::sync::OnceCell`: the first caller to reach a
/// fingerprint runs the computation, every concurrent caller for the same
/// fingerprint awaits that same future and receives the identical result —
/// this *is* the `{Absent, InFlight(promise), Ready(stored)}` state
/// machine, expressed directly by the primitive rather than hand-rolled.
pub struct Cache {
    entries: DashMap<Fingerprint, Arc<OnceCell<Arc<StoredResult>>>>,
    recency: Mutex<LruCache<Fingerprint, ()>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Cache {
            entries: DashMap::new(),
            recency: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up `fingerprint`; on a miss (or when `force` is set) runs
    /// `compute` and stores its result. Returns the stored result and
    /// whether this call observed a pre-existing entry (a cache hit).
    ///
    /// `force=true` always recomputes and always reports a miss, but the
    /// freshly computed result still replaces whatever was cached — the
    /// request "still writes" per the force contract.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        force: bool,
        compute: F,
    ) -> (Arc<StoredResult>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoredResult>,
    {
        if force {
            let result = Arc::new(compute().await);
            let cell = OnceCell::new();
            let _ = cell.set(Arc::clone(&result));
            self.insert(fingerprint, Arc::new(cell));
            return (result, false);
        }

        let cell = match self.entries.get(&fingerprint) {
            Some(existing) => Arc::clone(existing.value()),
            None => {
                let fresh = Arc::new(OnceCell::new());
                self.entries
                    .entry(fingerprint)
                    .or_insert_with(|| fresh)
                    .value()
                    .clone()
            }
        };

        let was_hit = cell.initialized();
        let result = cell
            .get_or_init(|| async { Arc::new(compute().await) })
            .await
            .clone();

        self.recency.lock().put(fingerprint, ());
        self.evict_if_needed();

        (result, was_hit)
    }

    /// Drops a fingerprint's entry entirely. Used when the single computation
    /// that would have populated it failed, so a transient execution error
    /// never lingers as a poisoned cache entry for later identical requests.
    pub fn invalidate(&self, fingerprint: &Fingerprint) {
        self.entries.remove(fingerprint);
        self.recency.lock().pop(fingerprint);
    }

    fn insert(&self, fingerprint: Fingerprint, cell: Arc<OnceCell<Arc<StoredResult>>>) {
        self.entries.insert(fingerprint, cell);
        self.recency.lock().put(fingerprint, ());
        self.evict_if_needed();
    }

    fn evict_if_needed(&self) {
        let mut recency = self.recency.lock();
        while recency.len() > recency.cap().get() {
            if let Some((evicted, _)) = recency.pop_lru() {
                self.entries.remove(&evicted);
            } else {
                break;
            }
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stored(stdout: &str) -> StoredResult {
        StoredResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration: 0.0,
            timed_out: false,
            files: None,
            commands: None,
        }
    }

    #[tokio::test]
    async fn first_lookup_is_a_miss_second_is_a_hit() {
        let cache = Cache::new();
        let fp = Fingerprint::from_bytes([1; 32]);

        let (first, hit1) = cache
            .get_or_compute(fp, false, || async { stored("a") })
            .await;
        assert!(!hit1);
        assert_eq!(first.stdout, "a");

        let (second, hit2) = cache
            .get_or_compute(fp, false, || async { stored("b") })
            .await;
        assert!(hit2);
        assert_eq!(second.stdout, "a");
    }

    #[tokio::test]
    async fn force_always_recomputes_and_reports_miss() {
        let cache = Cache::new();
        let fp = Fingerprint::from_bytes([2; 32]);
        cache
            .get_or_compute(fp, false, || async { stored("a") })
            .await;

        let (result, hit) = cache
            .get_or_compute(fp, true, || async { stored("b") })
            .await;
        assert!(!hit);
        assert_eq!(result.stdout, "b");
    }

    #[tokio::test]
    async fn invalidate_allows_recomputation_after_a_failed_run() {
        let cache = Cache::new();
        let fp = Fingerprint::from_bytes([4; 32]);
        cache
            .get_or_compute(fp, false, || async { stored("sentinel-on-error") })
            .await;
        cache.invalidate(&fp);

        let (result, hit) = cache
            .get_or_compute(fp, false, || async { stored("recomputed") })
            .await;
        assert!(!hit);
        assert_eq!(result.stdout, "recomputed");
    }

    #[tokio::test]
    async fn concurrent_identical_lookups_compute_once() {
        let cache = Arc::new(Cache::new());
        let fp = Fingerprint::from_bytes([3; 32]);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(fp, false, || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            stored("only-once")
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let (result, _) = handle.await.unwrap();
            assert_eq!(result.stdout, "only-once");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
