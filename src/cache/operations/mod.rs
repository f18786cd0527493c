/// 缓存操作
/// 提供限流、响应缓存和聚合缓存的实现

// 进程内限流
pub mod rate_limit;

// 带 TTL 的响应缓存
pub mod response;

// 单飞聚合缓存
pub mod aggregate;

// 重新导出常用操作
pub use aggregate::AggregateCache;
pub use rate_limit::RateLimiter;
pub use response::ResponseCache;
