use crate::infra::{AppState, CounterService};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use parcel_ops::error::AppError;
use parcel_ops::packages::{package_router, ImportSummary, LegacyImporter};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

pub(crate) fn with_package_routes(service: Arc<CounterService>) -> axum::Router {
    package_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/imports/legacy",
            axum::routing::post(legacy_import_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Accepts a legacy CSV export as the request body.
pub(crate) async fn legacy_import_endpoint(
    Extension(state): Extension<AppState>,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    let writes = LegacyImporter::from_reader(Cursor::new(body.into_bytes()))?;
    let summary = state.counter.import_legacy(writes).await?;
    Ok(Json(summary))
}
