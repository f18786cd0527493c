use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use crate::{AppState, cache::CacheStats, error::AppError, utils::success_to_api_response};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub instance_id: String,
    pub responses: CacheStats,
    pub aggregate: CacheStats,
    pub aggregate_in_flight: usize,
    pub rate_limit_keys: usize,
}

pub async fn health() -> impl IntoResponse {
    success_to_api_response(HealthResponse { status: "ok" })
}

#[axum::debug_handler]
pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(CacheStatsResponse {
        instance_id: state.active_instance(),
        responses: state.responses.stats(),
        aggregate: state.aggregate.stats(),
        aggregate_in_flight: state.aggregate.in_flight(),
        rate_limit_keys: state.limiter.tracked_keys(),
    })
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
