/// 缓存键模块
/// 提供限流键和响应缓存键的生成函数
use serde::Serialize;

/// 聚合数据缓存使用的逻辑资源名
pub const DASHBOARD_ENDPOINT: &str = "dashboard";

/// 生成限流键：客户端标识 + 路径分类
pub fn rate_limit_key(client_id: &str, category: &str) -> String {
    format!("{}:{}", client_id, category)
}

/// 生成响应缓存键
///
/// 参数先转成 `serde_json::Value`，对象字段按键名排序后再序列化，
/// 所以参数顺序不影响结果，任一参数值不同都会得到不同的键。
pub fn get_cache_key<P: Serialize + ?Sized>(endpoint: &str, instance: &str, params: &P) -> String {
    let canonical = match serde_json::to_value(params) {
        Ok(value) => value.to_string(),
        Err(e) => {
            tracing::warn!("Failed to serialize cache key params for {}: {}", endpoint, e);
            "null".to_string()
        }
    };
    format!("{}:{}:{}", endpoint, instance, canonical)
}
