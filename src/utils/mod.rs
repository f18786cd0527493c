use axum::Json;
use serde::Serialize;

use crate::result::ApiResponse;

// 所有 handler 统一返回 Json<ApiResponse<T>>
pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

pub fn error_to_api_response<T: Serialize>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse::error(code, msg))
}

// 上游失败时仍返回默认数据，code 标记为上游错误
pub fn degraded_to_api_response<T: Serialize>(msg: String, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::UPSTREAM_ERROR,
        msg,
        resp_data: Some(data),
    })
}

/// 按字符截断，不会切断多字节字符
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const UPSTREAM_ERROR: i32 = 2000;
}
