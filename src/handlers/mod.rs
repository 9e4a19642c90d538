pub mod incident_handlers;
pub mod monitoring_handlers;
pub mod scan_handlers;

use axum::Json;
use serde_json::{json, Value};

/// Basic liveness check
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "secops-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
