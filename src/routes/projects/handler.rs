use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    cache::{DataSource, get_cache_key, models::CollectionResponse},
    utils::{degraded_to_api_response, success_to_api_response},
};

use super::model::{PROJECTS_ENDPOINT, ProjectQuery};

#[axum::debug_handler]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> impl IntoResponse {
    let instance = state.active_instance();
    let key = get_cache_key(PROJECTS_ENDPOINT, &instance, &query);

    if let Some(items) = state.responses.get_cached(&key) {
        return success_to_api_response(CollectionResponse {
            items,
            source: DataSource::Cache,
            error: None,
        });
    }

    let params = query.to_params();
    match state
        .upstream
        .fetch_collection(&instance, PROJECTS_ENDPOINT, &params)
        .await
    {
        Ok(items) => {
            state.responses.set_cache(&key, items.clone(), None);
            success_to_api_response(CollectionResponse {
                items,
                source: DataSource::Live,
                error: None,
            })
        }
        Err(e) => {
            tracing::error!("Failed to fetch projects for {}: {}", instance, e);
            let msg = e.to_string();
            degraded_to_api_response(
                msg.clone(),
                CollectionResponse {
                    items: Vec::new(),
                    source: DataSource::Error,
                    error: Some(msg),
                },
            )
        }
    }
}
