use std::sync::{Arc, RwLock};

use axum::{
    Router,
    routing::{get, post},
};
use serde_json::Value;

use cache::{AggregateCache, RateLimiter, ResponseCache};
use clock::{Clock, SystemClock};
use config::Config;
use middleware::{RateLimitGuard, log_errors, rate_limit};
use upstream::CrmSource;

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod result;
pub mod routes;
pub mod upstream;
pub mod utils;

/// 应用状态，所有缓存和限流器都在这里显式创建并注入
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub responses: Arc<ResponseCache<Vec<Value>>>,
    pub aggregate: Arc<AggregateCache>,
    pub upstream: Arc<dyn CrmSource>,
    instance: Arc<RwLock<String>>,
}

impl AppState {
    pub fn new(config: Config, upstream: Arc<dyn CrmSource>) -> Self {
        Self::with_clock(config, upstream, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, upstream: Arc<dyn CrmSource>, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_window(),
            config.rate_limit_sweep_probability,
            clock.clone(),
        );
        let responses = ResponseCache::new(config.cache_ttl(), clock.clone());
        let aggregate = AggregateCache::new(config.aggregate_cache_ttl(), clock);
        let instance = config.upstream_instance_id.clone();

        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            responses: Arc::new(responses),
            aggregate: Arc::new(aggregate),
            upstream,
            instance: Arc::new(RwLock::new(instance)),
        }
    }

    pub fn active_instance(&self) -> String {
        self.instance
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 切换上游实例并清空缓存，返回之前的实例 ID
    pub fn switch_instance(&self, instance_id: &str) -> String {
        let previous = {
            let mut current = self.instance.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, instance_id.to_string())
        };
        self.responses.clear_cache();
        self.aggregate.clear();
        tracing::info!("Switched upstream instance {} -> {}", previous, instance_id);
        previous
    }
}

/// 组装路由和中间件，CORS 和监听由调用方决定
pub fn build_router(state: AppState) -> Router {
    let guard = Arc::new(RateLimitGuard::new(
        state.limiter.clone(),
        state.config.clone(),
    ));

    let api_routes = Router::new()
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .route("/projects", get(routes::projects::list_projects))
        .route("/instance", post(routes::instance::switch_instance))
        .route("/cache/stats", get(routes::system::cache_stats));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api_routes)
        .fallback(routes::system::not_found)
        .layer(axum::middleware::from_fn_with_state(guard, rate_limit))
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
