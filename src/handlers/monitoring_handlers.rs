use crate::error::{ApiError, ApiResult};
use crate::models::{
    MonitoringStatus, MonitoringTarget, MonitoringTargetCreate, Threat, ThreatReport, ThreatStatus,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

/// POST /api/monitoring/start
pub async fn start_monitoring(
    State(state): State<AppState>,
) -> ApiResult<Json<MonitoringStatus>> {
    state.monitor_service.start().await;
    Ok(Json(state.monitor_service.status().await))
}

/// POST /api/monitoring/stop
pub async fn stop_monitoring(
    State(state): State<AppState>,
) -> ApiResult<Json<MonitoringStatus>> {
    state.monitor_service.stop().await;
    Ok(Json(state.monitor_service.status().await))
}

/// GET /api/monitoring/status
pub async fn monitoring_status(
    State(state): State<AppState>,
) -> ApiResult<Json<MonitoringStatus>> {
    Ok(Json(state.monitor_service.status().await))
}

/// GET /api/monitoring/targets
pub async fn list_targets(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<MonitoringTarget>>> {
    Ok(Json(state.store.list_targets().await))
}

/// POST /api/monitoring/targets - register a watched (source, target) pair
pub async fn create_target(
    State(state): State<AppState>,
    Json(request): Json<MonitoringTargetCreate>,
) -> ApiResult<(StatusCode, Json<MonitoringTarget>)> {
    let source = request.source.trim();
    if source.is_empty() {
        return Err(ApiError::validation("source must not be empty"));
    }
    let target = request.target.trim();
    if target.is_empty() {
        return Err(ApiError::validation("target must not be empty"));
    }

    let entry = state
        .store
        .add_target(source.to_string(), target.to_string())
        .await;

    // Registration itself is tracked as a low-severity incident
    state.incident_service.record_target_added(&entry).await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/monitoring/targets/:id
pub async fn delete_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.store.remove_target(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "monitoring target {} not found",
            id
        )))
    }
}

/// POST /api/monitoring/targets/:id/toggle
pub async fn toggle_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MonitoringTarget>> {
    state
        .store
        .toggle_target(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("monitoring target {} not found", id)))
}

/// GET /api/threats - threat history, most recent first
pub async fn list_threats(State(state): State<AppState>) -> ApiResult<Json<Vec<Threat>>> {
    Ok(Json(state.store.recent_threats().await))
}

/// POST /api/threats/report - manual threat reporting
pub async fn report_threat(
    State(state): State<AppState>,
    Json(report): Json<ThreatReport>,
) -> ApiResult<(StatusCode, Json<Threat>)> {
    let threat = state.monitor_service.report_threat(report).await?;
    Ok((StatusCode::CREATED, Json(threat)))
}

#[derive(Debug, Deserialize)]
pub struct ThreatStatusUpdate {
    pub status: ThreatStatus,
}

/// PATCH /api/threats/:id - triage a pending threat
pub async fn update_threat_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ThreatStatusUpdate>,
) -> ApiResult<Json<Threat>> {
    if update.status == ThreatStatus::Pending {
        return Err(ApiError::validation(
            "a threat cannot be moved back to pending",
        ));
    }

    let threat = state.store.set_threat_status(id, update.status).await?;
    Ok(Json(threat))
}
