use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{Barcode, Package};
use super::intake::{BarcodeSource, IntakeRequest};
use super::report::Period;
use super::search::SearchQuery;
use super::service::{DetailsCorrection, PackageService, ParcelError};
use super::store::PackageStore;

/// Router builder exposing the counter operations as JSON endpoints.
pub fn package_router<S, B>(service: Arc<PackageService<S, B>>) -> Router
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    Router::new()
        .route("/api/v1/packages", post(intake_handler::<S, B>))
        .route("/api/v1/packages/search", get(search_handler::<S, B>))
        .route(
            "/api/v1/packages/:barcode",
            get(get_handler::<S, B>).patch(correct_handler::<S, B>),
        )
        .route(
            "/api/v1/packages/:barcode/deliver",
            post(deliver_handler::<S, B>),
        )
        .route(
            "/api/v1/packages/:barcode/return",
            post(mark_for_return_handler::<S, B>),
        )
        .route(
            "/api/v1/pickups",
            get(pending_handler::<S, B>).post(commit_pickup_handler::<S, B>),
        )
        .route("/api/v1/reports/monthly", get(report_handler::<S, B>))
        .with_state(service)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    pub(crate) packages: Vec<Package>,
    pub(crate) shown: usize,
    pub(crate) total_matched: usize,
    pub(crate) has_more: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportParams {
    #[serde(default)]
    pub(crate) month: Option<String>,
}

pub(crate) async fn intake_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Json(request): Json<IntakeRequest>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.intake(request).await {
        Ok(package) => (StatusCode::CREATED, Json(package)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Path(barcode): Path<String>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.get(&Barcode(barcode)).await {
        Ok(package) => (StatusCode::OK, Json(package)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn correct_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Path(barcode): Path<String>,
    Json(correction): Json<DetailsCorrection>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.correct_details(&Barcode(barcode), correction).await {
        Ok(package) => (StatusCode::OK, Json(package)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn search_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Query(query): Query<SearchQuery>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    let snapshot = match service.load_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => return error_response(err),
    };
    let results = service.search(&snapshot, &query);
    let has_more = results.has_more();
    let body = SearchResponse {
        shown: results.shown.len(),
        total_matched: results.total_matched,
        has_more,
        packages: results.shown,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub(crate) async fn deliver_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Path(barcode): Path<String>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.deliver(&Barcode(barcode)).await {
        Ok(package) => (StatusCode::OK, Json(package)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn mark_for_return_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Path(barcode): Path<String>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.mark_for_return(&Barcode(barcode)).await {
        Ok(package) => (StatusCode::OK, Json(package)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn pending_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.load_pending().await {
        Ok(pending) => (
            StatusCode::OK,
            Json(json!({ "count": pending.len(), "packages": pending })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn commit_pickup_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Json(batch): Json<Vec<Package>>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    match service.commit_pickup(&batch).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_handler<S, B>(
    State(service): State<Arc<PackageService<S, B>>>,
    Query(params): Query<ReportParams>,
) -> Response
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    let period = match params.month.as_deref() {
        Some(month) => match Period::from_month(month) {
            Ok(period) => period,
            Err(err) => {
                let payload = json!({ "error": err.to_string() });
                return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
            }
        },
        None => match service.current_period().await {
            Ok(period) => period,
            Err(err) => return error_response(err),
        },
    };

    match service.report(period).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: ParcelError) -> Response {
    let (status, kind) = match &err {
        ParcelError::DuplicateIdentifier(_) => (StatusCode::CONFLICT, "duplicate_identifier"),
        ParcelError::RecordNotFound(_) => (StatusCode::NOT_FOUND, "record_not_found"),
        ParcelError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
        ParcelError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
        ParcelError::PartialBatchFailure { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "partial_batch_failure")
        }
        ParcelError::ImportInterrupted { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "import_interrupted")
        }
    };
    let payload = json!({
        "error": err.to_string(),
        "kind": kind,
    });
    (status, Json(payload)).into_response()
}
