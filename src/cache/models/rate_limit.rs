use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::deadline;

/// 速率限制记录
/// 只在 `now < window_reset_at` 时递增，过期后整条替换成新窗口
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_reset_at: Instant,
}

impl RateLimitRecord {
    pub fn new_window(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            window_reset_at: deadline(now, window),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.window_reset_at
    }
}

/// 一次限流判断的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: Duration,
}

impl RateLimitDecision {
    pub fn reset_in_ms(&self) -> u64 {
        u64::try_from(self.reset_in.as_millis()).unwrap_or(u64::MAX)
    }

    /// 向上取整的秒数，用于 `Retry-After` / `X-RateLimit-Reset`
    pub fn reset_in_secs(&self) -> u64 {
        self.reset_in_ms().div_ceil(1000)
    }
}

/// 429 响应体中携带的限流信息
#[derive(Debug, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_in_ms: u64,
}

impl From<&RateLimitDecision> for RateLimitInfo {
    fn from(decision: &RateLimitDecision) -> Self {
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_in_ms: decision.reset_in_ms(),
        }
    }
}
