use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::activity::{ActivityKind, ActivityLevel};
use crate::error::{ServiceError, ServiceResult};
use crate::settings::{save_settings, PersistentSettings};
use crate::state::SharedState;

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> Json<PersistentSettings> {
    Json(state.settings.read().await.clone())
}

/// PUT /api/settings: replace the persisted settings and apply pricing
/// overrides to the ledger immediately.
pub async fn put_settings(
    State(state): State<SharedState>,
    body: Result<Json<PersistentSettings>, JsonRejection>,
) -> ServiceResult<Json<PersistentSettings>> {
    let Json(settings) =
        body.map_err(|e| ServiceError::Validation(format!("Invalid settings: {}", e)))?;
    settings.validate()?;

    let mut current = state.settings.write().await;
    save_settings(&state.config.settings_path(), &settings)?;
    state.ledger.set_pricing(settings.pricing_table());
    *current = settings.clone();
    drop(current);
    info!("Settings updated");
    state
        .activity
        .record(
            ActivityKind::Settings,
            ActivityLevel::Info,
            None,
            "Settings updated",
        )
        .await;

    Ok(Json(settings))
}
