use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::activity::{ActivityKind, ActivityLevel};
use crate::credits::CreditBalance;
use crate::error::{ServiceError, ServiceResult};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct GrantRequest {
    pub credits: i64,
}

/// POST /api/credits/grant: operator top-up of paid credits.
pub async fn grant_credits(
    State(state): State<SharedState>,
    body: Result<Json<GrantRequest>, JsonRejection>,
) -> ServiceResult<Json<CreditBalance>> {
    let Json(request) =
        body.map_err(|e| ServiceError::Validation(format!("Invalid grant request: {}", e)))?;
    if request.credits <= 0 {
        return Err(ServiceError::Validation(
            "credits must be a positive number".to_string(),
        ));
    }

    let balance = state.ledger.grant(request.credits);
    state
        .activity
        .record(
            ActivityKind::Credits,
            ActivityLevel::Info,
            None,
            format!(
                "Granted {} credits, paid balance now {}",
                request.credits, balance.paid_credits
            ),
        )
        .await;
    Ok(Json(balance))
}
