use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scan::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Active,
    Critical,
    Resolved,
}

/// Escalated security incident; recommendations are append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub source: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to record a new incident
#[derive(Debug, Clone)]
pub struct IncidentCreate {
    pub title: String,
    pub description: String,
    pub source: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub recommendations: Vec<String>,
    pub threat_id: Option<Uuid>,
}

impl From<IncidentCreate> for Incident {
    fn from(create: IncidentCreate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: create.title,
            description: create.description,
            source: create.source,
            severity: create.severity,
            status: create.status,
            recommendations: create.recommendations,
            threat_id: create.threat_id,
            created_at: now,
            updated_at: now,
        }
    }
}
