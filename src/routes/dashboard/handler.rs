use axum::{extract::State, response::IntoResponse};

use crate::{
    AppState,
    cache::DataSource,
    utils::{degraded_to_api_response, success_to_api_response},
};

/// 客户、项目、服务请求和发票的聚合视图
#[axum::debug_handler]
pub async fn get_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let instance = state.active_instance();
    let response = state
        .aggregate
        .load(&instance, state.upstream.clone())
        .await;

    match (response.source, response.error.clone()) {
        (DataSource::Error, Some(msg)) => degraded_to_api_response(msg, response),
        _ => success_to_api_response(response),
    }
}
