use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let api = state.settings().api();
    let response = RootResponse {
        message: api.project_name.clone(),
        version: api.version.clone(),
        api_prefix: api.api_v1_str.clone(),
    };

    Json(response)
}

/// The service keeps no connections of its own, so health reports session load.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let capacity = state.settings().exam().max_active_sessions;
    let active = state.sessions().len().await;

    let mut components = HashMap::new();
    components.insert("sessions".to_string(), format!("{active}/{capacity}"));
    components.insert(
        "tab_switch_policy".to_string(),
        state.settings().exam().tab_switch_policy.as_str().to_string(),
    );

    let status = if active >= capacity { "saturated" } else { "healthy" };

    Json(HealthResponse {
        service: "exam-conductor".to_string(),
        status: status.to_string(),
        components,
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
