// 缓存模块
// 包含限流记录、响应缓存的数据结构和操作逻辑

pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型和函数，方便其他模块使用
pub use keys::get_cache_key;
pub use models::{
    AggregateResponse, CacheStats, DataSource, FetchedSnapshot, RateLimitDecision, Snapshot,
};
pub use operations::{AggregateCache, RateLimiter, ResponseCache};
