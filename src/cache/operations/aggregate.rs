use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::json;

use crate::cache::keys::{DASHBOARD_ENDPOINT, get_cache_key};
use crate::cache::models::{AggregateResponse, CacheStats, DataSource, FetchedSnapshot, Snapshot};
use crate::cache::operations::response::ResponseCache;
use crate::clock::Clock;
use crate::upstream::{CrmSource, UpstreamError};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<FetchedSnapshot>, UpstreamError>>>;

struct Inner {
    cache: ResponseCache<Arc<FetchedSnapshot>>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 拉取任务结束时移除进行中的记录，任务 panic 时同样生效
struct InFlightGuard {
    inner: Weak<Inner>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.in_flight().remove(&self.key);
        }
    }
}

/// 聚合数据缓存
///
/// 同一个键同时只会有一次上游拉取，并发调用方等待同一个结果。
/// 拉取在独立任务中运行，调用方断开不会中断它；
/// 结束（无论成功失败）后移除进行中的记录，成功结果写入 TTL 缓存。
pub struct AggregateCache {
    inner: Arc<Inner>,
}

impl AggregateCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: ResponseCache::new(ttl, clock),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// 先查缓存，再复用进行中的拉取，最后才发起新的拉取
    ///
    /// `fetch` 只有在真正需要拉取时才会被 poll。必须在 tokio 运行时中调用。
    pub async fn get_or_fetch<F>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<(Arc<FetchedSnapshot>, DataSource), UpstreamError>
    where
        F: Future<Output = Result<Snapshot, UpstreamError>> + Send + 'static,
    {
        let pending = {
            let mut in_flight = self.inner.in_flight();

            if let Some(fetched) = self.inner.cache.get_cached(key) {
                return Ok((fetched, DataSource::Cache));
            }

            match in_flight.get(key) {
                Some(pending) => {
                    tracing::debug!("Joining in-flight fetch for {}", key);
                    pending.clone()
                }
                None => {
                    let pending = self.start_fetch(key, fetch);
                    in_flight.insert(key.to_string(), pending.clone());
                    pending
                }
            }
        };

        pending.await.map(|fetched| (fetched, DataSource::Live))
    }

    // 调用时必须持有 in_flight 锁，保证任务的移除发生在登记之后
    fn start_fetch<F>(&self, key: &str, fetch: F) -> SharedFetch
    where
        F: Future<Output = Result<Snapshot, UpstreamError>> + Send + 'static,
    {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let key = key.to_string();

        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: inner.clone(),
                key: key.clone(),
            };
            let result = fetch.await.map(|snapshot| Arc::new(FetchedSnapshot::now(snapshot)));
            // 先写缓存，guard 随后移除进行中记录，新来的调用方总能拿到其中之一
            if let (Ok(fetched), Some(inner)) = (&result, inner.upgrade()) {
                inner.cache.set_cache(&key, Arc::clone(fetched), None);
            }
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!("Aggregate fetch task failed: {}", e);
                Err(UpstreamError::Request(format!("fetch task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }

    /// 加载某个实例的聚合数据，上游出错时返回空集合并标记 source 为 error
    pub async fn load(&self, instance: &str, source: Arc<dyn CrmSource>) -> AggregateResponse {
        let key = get_cache_key(DASHBOARD_ENDPOINT, instance, &json!({}));
        let instance = instance.to_string();
        let fetch = async move { source.fetch_snapshot(&instance).await };

        match self.get_or_fetch(&key, fetch).await {
            Ok((fetched, data_source)) => AggregateResponse::from_snapshot(&fetched, data_source),
            Err(e) => {
                tracing::error!("Aggregate fetch failed for {}: {}", key, e);
                AggregateResponse::failed(e.to_string())
            }
        }
    }

    /// 清空缓存，进行中的拉取照常完成
    pub fn clear(&self) {
        self.inner.cache.clear_cache();
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight().len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn snapshot_with_customer(id: u64) -> Snapshot {
        Snapshot {
            customers: vec![json!({ "id": id })],
            ..Snapshot::default()
        }
    }

    fn gated_fetch(
        calls: Arc<AtomicUsize>,
        gate: Arc<Semaphore>,
        result: Result<Snapshot, UpstreamError>,
    ) -> impl Future<Output = Result<Snapshot, UpstreamError>> + Send + 'static {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let _permit = gate.acquire().await.map_err(|e| UpstreamError::Request(e.to_string()))?;
            result
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let first = cache.get_or_fetch(
            "k",
            gated_fetch(calls.clone(), gate.clone(), Ok(snapshot_with_customer(1))),
        );
        let second = cache.get_or_fetch(
            "k",
            gated_fetch(calls.clone(), gate.clone(), Ok(snapshot_with_customer(1))),
        );
        let release = async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        };

        let (a, b, ()) = tokio::join!(first, second, release);
        let (a, a_source) = a.unwrap();
        let (b, b_source) = b.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.snapshot.customers, vec![json!({"id": 1})]);
        assert_eq!((a_source, b_source), (DataSource::Live, DataSource::Live));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn later_calls_hit_the_cache_until_ttl() {
        let clock = ManualClock::new();
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(clock.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(10));

        let fetch = || gated_fetch(calls.clone(), gate.clone(), Ok(snapshot_with_customer(1)));

        assert_eq!(cache.get_or_fetch("k", fetch()).await.unwrap().1, DataSource::Live);
        assert_eq!(cache.get_or_fetch("k", fetch()).await.unwrap().1, DataSource::Cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get_or_fetch("k", fetch()).await.unwrap().1, DataSource::Live);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_shared_and_not_cached() {
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let err = || Err(UpstreamError::Request("connection refused".to_string()));

        let (a, b, ()) = tokio::join!(
            cache.get_or_fetch("k", gated_fetch(calls.clone(), gate.clone(), err())),
            cache.get_or_fetch("k", gated_fetch(calls.clone(), gate.clone(), err())),
            async {
                tokio::task::yield_now().await;
                gate.add_permits(1);
            }
        );
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().entries, 0);

        // 失败后重新发起拉取
        gate.add_permits(1);
        let retry = cache
            .get_or_fetch("k", gated_fetch(calls.clone(), gate.clone(), Ok(Snapshot::default())))
            .await;
        assert!(retry.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_keys_fetch_independently() {
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(10));

        let (a, b) = tokio::join!(
            cache.get_or_fetch("a", gated_fetch(calls.clone(), gate.clone(), Ok(snapshot_with_customer(1)))),
            cache.get_or_fetch("b", gated_fetch(calls.clone(), gate.clone(), Ok(snapshot_with_customer(2)))),
        );
        assert_ne!(a.unwrap().0.snapshot.customers, b.unwrap().0.snapshot.customers);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_a_new_fetch() {
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(10));
        let fetch = || gated_fetch(calls.clone(), gate.clone(), Ok(Snapshot::default()));

        cache.get_or_fetch("k", fetch()).await.unwrap();
        cache.clear();
        assert_eq!(cache.get_or_fetch("k", fetch()).await.unwrap().1, DataSource::Live);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_stall_the_fetch() {
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let first = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_fetch("k", gated_fetch(calls.clone(), gate.clone(), Ok(snapshot_with_customer(1)))),
        )
        .await;
        assert!(first.is_err());
        assert_eq!(cache.in_flight(), 1);

        gate.add_permits(1);
        for _ in 0..50 {
            if cache.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().entries, 1);

        let (fetched, source) = cache
            .get_or_fetch("k", gated_fetch(calls.clone(), gate.clone(), Ok(Snapshot::default())))
            .await
            .unwrap();
        assert_eq!(source, DataSource::Cache);
        assert_eq!(fetched.snapshot.customers, vec![json!({"id": 1})]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hits_keep_the_original_fetch_time() {
        let cache = AggregateCache::new(Duration::from_secs(60), Arc::new(ManualClock::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(10));
        let fetch = || gated_fetch(calls.clone(), gate.clone(), Ok(Snapshot::default()));

        let (live, _) = cache.get_or_fetch("k", fetch()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (cached, source) = cache.get_or_fetch("k", fetch()).await.unwrap();

        assert_eq!(source, DataSource::Cache);
        assert_eq!(cached.fetched_at, live.fetched_at);
    }
}
