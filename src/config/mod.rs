use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
}

/// 按路径前缀划分的限流规则，先匹配先生效
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RateLimitRule {
    pub prefix: String,
    pub category: String,
    pub limit: u32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub upstream_base_url: String,
    pub upstream_api_key: String,
    pub upstream_instance_id: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_rules: Vec<RateLimitRule>,
    pub rate_limit_sweep_probability: f64,
    pub cache_ttl_secs: u64,
    pub aggregate_cache_ttl_secs: u64,
}

// 默认值
const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_REQUESTS: u32 = 100;
const DEFAULT_CHAT_REQUESTS: u32 = 10;
const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_AGGREGATE_TTL_SECS: u64 = 60;

pub const DEFAULT_CATEGORY: &str = "api";

impl Config {
    /// 使用默认值构造配置，只需要上游地址和密钥
    pub fn new(upstream_base_url: impl Into<String>, upstream_api_key: impl Into<String>) -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: DEFAULT_SERVER_PORT,
            upstream_base_url: upstream_base_url.into(),
            upstream_api_key: upstream_api_key.into(),
            upstream_instance_id: "default".to_string(),
            rate_limit_window_secs: DEFAULT_WINDOW_SECS,
            rate_limit_requests: DEFAULT_REQUESTS,
            rate_limit_rules: default_rules(DEFAULT_CHAT_REQUESTS),
            rate_limit_sweep_probability: DEFAULT_SWEEP_PROBABILITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            aggregate_cache_ttl_secs: DEFAULT_AGGREGATE_TTL_SECS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let upstream_base_url =
            env::var("UPSTREAM_BASE_URL").map_err(|_| ConfigError::Missing("UPSTREAM_BASE_URL"))?;
        let upstream_api_key =
            env::var("UPSTREAM_API_KEY").map_err(|_| ConfigError::Missing("UPSTREAM_API_KEY"))?;

        let chat_requests = parse_or("RATE_LIMIT_CHAT_REQUESTS", DEFAULT_CHAT_REQUESTS);

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", DEFAULT_SERVER_PORT),
            upstream_base_url: upstream_base_url.trim_end_matches('/').to_string(),
            upstream_api_key,
            upstream_instance_id: env::var("UPSTREAM_INSTANCE_ID")
                .unwrap_or_else(|_| "default".to_string()),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", DEFAULT_WINDOW_SECS),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", DEFAULT_REQUESTS),
            rate_limit_rules: default_rules(chat_requests),
            rate_limit_sweep_probability: parse_or(
                "RATE_LIMIT_SWEEP_PROBABILITY",
                DEFAULT_SWEEP_PROBABILITY,
            )
            .clamp(0.0, 1.0),
            cache_ttl_secs: parse_or("CACHE_TTL", DEFAULT_CACHE_TTL_SECS),
            aggregate_cache_ttl_secs: parse_or("AGGREGATE_CACHE_TTL", DEFAULT_AGGREGATE_TTL_SECS),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn aggregate_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.aggregate_cache_ttl_secs)
    }

    /// 根据请求路径找到限流分类和配额
    pub fn rate_limit_for(&self, path: &str) -> (&str, u32) {
        self.rate_limit_rules
            .iter()
            .find(|rule| matches_prefix(path, &rule.prefix))
            .map(|rule| (rule.category.as_str(), rule.limit))
            .unwrap_or((DEFAULT_CATEGORY, self.rate_limit_requests))
    }
}

// 只在路径段边界上匹配，`/api/chat` 不匹配 `/api/chatter`
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

fn default_rules(chat_requests: u32) -> Vec<RateLimitRule> {
    vec![RateLimitRule {
        prefix: "/api/chat".to_string(),
        category: "chat".to_string(),
        limit: chat_requests,
    }]
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_paths_get_the_stricter_quota() {
        let config = Config::new("http://upstream.test", "key");
        assert_eq!(config.rate_limit_for("/api/chat"), ("chat", 10));
        assert_eq!(config.rate_limit_for("/api/chat/stream"), ("chat", 10));
        assert_eq!(config.rate_limit_for("/api/projects"), ("api", 100));
    }

    #[test]
    fn prefix_matches_only_whole_segments() {
        let config = Config::new("http://upstream.test", "key");
        assert_eq!(config.rate_limit_for("/api/chatter"), ("api", 100));
        assert_eq!(config.rate_limit_for("/api/chat-history"), ("api", 100));
        assert_eq!(config.rate_limit_for("/api/chat/"), ("chat", 10));
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut config = Config::new("http://upstream.test", "key");
        config.rate_limit_rules.push(RateLimitRule {
            prefix: "/api".to_string(),
            category: "broad".to_string(),
            limit: 1,
        });
        assert_eq!(config.rate_limit_for("/api/chat"), ("chat", 10));
        assert_eq!(config.rate_limit_for("/api/dashboard"), ("broad", 1));
    }

    #[test]
    fn durations_follow_seconds() {
        let config = Config::new("http://upstream.test", "key");
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.aggregate_cache_ttl(), Duration::from_secs(60));
    }
}
