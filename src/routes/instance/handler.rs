use axum::{
    extract::{Json, State},
    response::IntoResponse,
};

use crate::{AppState, error::AppError, utils::success_to_api_response};

use super::model::{SwitchInstanceRequest, SwitchInstanceResponse};

/// 切换当前上游实例，同时清空两个缓存
#[axum::debug_handler]
pub async fn switch_instance(
    State(state): State<AppState>,
    Json(req): Json<SwitchInstanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instance_id = req.instance_id.trim();
    if instance_id.is_empty() {
        return Err(AppError::InvalidInstance);
    }

    let previous_instance_id = state.switch_instance(instance_id);
    Ok(success_to_api_response(SwitchInstanceResponse {
        instance_id: instance_id.to_string(),
        previous_instance_id,
    }))
}
