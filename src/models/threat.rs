use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scan::Severity;

/// Triage state of a threat; only pending threats may transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatStatus {
    Pending,
    Confirmed,
    FalsePositive,
}

/// Risk scoring attached by the enrichment service (or its local fallback)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAnalysis {
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub summary: String,
}

/// A normalized event from any alert source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub id: Uuid,
    pub threat_type: String,
    pub severity: Severity,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub status: ThreatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ThreatAnalysis>,
}

impl Threat {
    pub fn new(
        threat_type: impl Into<String>,
        severity: Severity,
        source: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            threat_type: threat_type.into(),
            severity,
            source: source.into(),
            timestamp: Utc::now(),
            description: description.into(),
            status: ThreatStatus::Pending,
            analysis: None,
        }
    }
}

/// Watched (source, target) pair in the monitoring registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringTarget {
    pub id: Uuid,
    pub source: String,
    pub target: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringTargetCreate {
    pub source: String,
    pub target: String,
}

/// Manually reported threat payload
#[derive(Debug, Clone, Deserialize)]
pub struct ThreatReport {
    pub threat_type: String,
    pub description: String,
    pub severity: Severity,
}

/// Read model for the monitoring loop state
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    pub running: bool,
    pub sources: Vec<String>,
    pub threat_count: usize,
    pub capacity: usize,
}
