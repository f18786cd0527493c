/// 缓存数据模型
/// 定义限流记录、缓存条目和聚合数据的结构体
pub mod entry;
pub mod rate_limit;
pub mod snapshot;

// 重新导出常用类型
pub use entry::{CacheEntry, CacheStats};
pub use rate_limit::{RateLimitDecision, RateLimitInfo, RateLimitRecord};
pub use snapshot::{AggregateResponse, CollectionResponse, DataSource, FetchedSnapshot, Snapshot};
