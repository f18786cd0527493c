use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::cache::models::{CacheEntry, CacheStats};
use crate::clock::{Clock, deadline};

struct Store<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// 带 TTL 的进程内响应缓存
///
/// 读取时才检查过期，过期条目在读取时删除并按未命中处理。
pub struct ResponseCache<V> {
    store: Mutex<Store<V>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            default_ttl,
            clock,
        }
    }

    /// 读取未过期的值；过期或不存在时删除条目并返回 None
    pub fn get_cached(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut store = self.lock();

        let fresh = match store.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            _ => None,
        };

        match fresh {
            Some(value) => {
                store.hits += 1;
                tracing::debug!("Cache hit: {}", key);
                Some(value)
            }
            None => {
                store.misses += 1;
                if store.entries.remove(key).is_some() {
                    tracing::debug!("Cache entry expired: {}", key);
                } else {
                    tracing::debug!("Cache miss: {}", key);
                }
                None
            }
        }
    }

    /// 覆盖写入，`ttl` 为空时使用默认 TTL
    pub fn set_cache(&self, key: &str, value: V, ttl: Option<Duration>) {
        let expires_at = deadline(self.clock.now(), ttl.unwrap_or(self.default_ttl));
        self.lock()
            .entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    pub fn clear_cache(&self) {
        let mut store = self.lock();
        let cleared = store.entries.len();
        store.entries.clear();
        tracing::info!("Response cache cleared ({} entries)", cleared);
    }

    /// 只看键是否还在表里，不判断是否过期
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        CacheStats {
            entries: store.entries.len(),
            hits: store.hits,
            misses: store.misses,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store<V>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}
