use crate::error::{ApiError, ApiResult};
use crate::models::{ScanReport, ScanRequest};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

/// POST /api/scans - run the scan pipeline against a target
pub async fn create_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<(StatusCode, Json<ScanReport>)> {
    let report = state.scan_service.run_scan(&request.target).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/scans - list completed scan reports
pub async fn list_scans(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ScanReport>>> {
    Ok(Json(state.store.list_reports().await))
}

/// GET /api/scans/:id - fetch a single scan report
pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScanReport>> {
    state
        .store
        .get_report(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("scan {} not found", id)))
}
