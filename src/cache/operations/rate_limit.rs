use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::cache::keys::rate_limit_key;
use crate::cache::models::{RateLimitDecision, RateLimitRecord};
use crate::clock::Clock;

/// 进程内固定窗口限流器
///
/// 记录只保存在当前进程，重启即清零；多实例部署时各实例独立计数。
/// 过期记录不会被主动删除，只在部分请求上顺带清理。
pub struct RateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    window: Duration,
    sweep_probability: f64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(window: Duration, sweep_probability: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            window,
            sweep_probability: sweep_probability.clamp(0.0, 1.0),
            clock,
        }
    }

    /// 检查并记录一次请求
    ///
    /// 不做配额校验，调用方负责传入合理的 `limit`。
    pub fn check_rate_limit(&self, client_id: &str, limit: u32, category: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut records = self.lock();

        if self.should_sweep() {
            sweep_locked(&mut records, now);
        }

        let key = rate_limit_key(client_id, category);
        match records.get_mut(&key) {
            Some(record) if !record.is_expired(now) => {
                let reset_in = record.window_reset_at.saturating_duration_since(now);
                if record.count < limit {
                    record.count += 1;
                    RateLimitDecision {
                        allowed: true,
                        limit,
                        remaining: limit - record.count,
                        reset_in,
                    }
                } else {
                    tracing::warn!("Rate limit exceeded for {} ({}/{})", key, record.count, limit);
                    RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_in,
                    }
                }
            }
            _ => {
                // 首次请求或窗口已过期，整条替换
                records.insert(key, RateLimitRecord::new_window(now, self.window));
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset_in: self.window,
                }
            }
        }
    }

    /// 删除所有窗口已过期的记录，返回删除数量
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        sweep_locked(&mut self.lock(), now)
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn should_sweep(&self) -> bool {
        self.sweep_probability > 0.0 && rand::random::<f64>() < self.sweep_probability
    }

    // 锁中毒时继续使用内部数据
    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sweep_locked(records: &mut HashMap<String, RateLimitRecord>, now: Instant) -> usize {
    let before = records.len();
    records.retain(|_, record| !record.is_expired(now));
    let removed = before - records.len();
    if removed > 0 {
        tracing::debug!(
            removed_entries = removed,
            remaining_entries = records.len(),
            "Rate limiter sweep completed"
        );
    }
    removed
}
