use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug)]
pub enum AppError {
    InvalidInstance,
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::InvalidInstance => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                "实例 ID 不能为空",
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, "资源不存在"),
        };

        (status, error_to_api_response::<()>(code, msg.to_string())).into_response()
    }
}
