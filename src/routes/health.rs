use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engines: Vec<&'static str>,
    pub jobs_in_flight: usize,
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engines: state
            .registry
            .registered()
            .iter()
            .map(|t| t.as_str())
            .collect(),
        jobs_in_flight: state.progress.in_flight(),
    })
}
