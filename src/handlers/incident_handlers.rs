use crate::error::{ApiError, ApiResult};
use crate::models::Incident;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

/// GET /api/incidents - list all incidents
pub async fn list_incidents(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Incident>>> {
    Ok(Json(state.incident_service.list().await?))
}

/// POST /api/incidents/:id/handle - resolve an incident with contextual
/// recommendations
pub async fn handle_incident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Incident>> {
    state
        .incident_service
        .handle(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("incident {} not found", id)))
}
