use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    cache::RateLimiter,
    cache::models::{RateLimitDecision, RateLimitInfo},
    config::Config,
    result::ApiResponse,
    utils::{error_codes, truncate_chars},
};

/// user-agent 只取前缀，限制键长度
const USER_AGENT_PREFIX_CHARS: usize = 50;

/// 不参与限流的路径
const EXEMPT_PATHS: &[&str] = &["/health"];

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    config: Arc<Config>,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<RateLimiter>, config: Arc<Config>) -> Self {
        Self { limiter, config }
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let path = req.uri().path();
        if EXEMPT_PATHS.contains(&path) {
            return next.run(req).await;
        }

        // 从连接信息获取原始IP
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip());
        let client = client_id(req.headers(), remote_ip);

        let (category, limit) = self.config.rate_limit_for(path);
        let decision = self.limiter.check_rate_limit(&client, limit, category);

        if !decision.allowed {
            return too_many_requests(&decision);
        }

        let mut response = next.run(req).await;
        apply_headers(response.headers_mut(), &decision);
        response
    }
}

pub async fn rate_limit(
    State(guard): State<Arc<RateLimitGuard>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    guard.check_rate_limit(req, next).await
}

/// 客户端标识：来源地址 + 截断后的 user-agent
///
/// 地址优先取 x-forwarded-for 的第一个非空项，其次 x-real-ip，最后是连接地址。
pub fn client_id(headers: &HeaderMap, remote_ip: Option<IpAddr>) -> String {
    let remote_ip = remote_ip.map(|ip| ip.to_string());
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .or(remote_ip.as_deref()) // 降级使用连接IP
        .unwrap_or("unknown");

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|ua| truncate_chars(ua, USER_AGENT_PREFIX_CHARS))
        .filter(|ua| !ua.is_empty())
        .unwrap_or("unknown");

    format!("{}:{}", ip, user_agent)
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_in_secs()));
}

fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.reset_in_secs().max(1);
    let body = ApiResponse {
        code: error_codes::RATE_LIMIT,
        msg: format!("请求过于频繁，请在{}秒后重试", retry_after),
        resp_data: Some(RateLimitInfo::from(decision)),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_headers(response.headers_mut(), decision);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}
