use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::MAX_UPLOAD_BYTES;
use crate::error::ServiceError;
use crate::state::SharedState;

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ServiceError::Internal(format!("Request handler panicked: {}", detail)).into_response()
}

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        // Submissions and queries
        .route(
            "/api/test",
            post(crate::routes::test::submit_test)
                .get(crate::routes::test::query_test)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/credits/grant",
            post(crate::routes::credits::grant_credits),
        )
        // Reports
        .route(
            "/api/reports/export",
            post(crate::routes::reports::export_report),
        )
        .route("/api/reports/{id}", get(crate::routes::reports::view_report))
        .route(
            "/api/reports/{id}/download",
            get(crate::routes::reports::download_report),
        )
        // Settings
        .route(
            "/api/settings",
            get(crate::routes::settings::get_settings).put(crate::routes::settings::put_settings),
        )
        // Activity
        .route(
            "/api/activity/history",
            get(crate::routes::activity::activity_history),
        )
        .route(
            "/api/activity/stream",
            get(crate::routes::activity::activity_stream),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
