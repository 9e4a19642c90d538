pub mod incident_repo;

pub use incident_repo::{IncidentRepository, InMemoryIncidentRepository};

use crate::error::ApiError;
use crate::models::{MonitoringTarget, ScanReport, Threat, ThreatStatus};
use chrono::Utc;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Owned, shared security state: the bounded threat history, the monitoring
/// target registry and completed scan reports. All mutation goes through
/// named operations.
pub struct SecurityStore {
    threats: RwLock<VecDeque<Threat>>,
    targets: RwLock<Vec<MonitoringTarget>>,
    reports: RwLock<Vec<ScanReport>>,
    capacity: usize,
}

impl SecurityStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            threats: RwLock::new(VecDeque::with_capacity(capacity)),
            targets: RwLock::new(Vec::new()),
            reports: RwLock::new(Vec::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a threat to the history, evicting the oldest entry once the
    /// capacity is reached.
    pub async fn append_threat(&self, threat: Threat) {
        let mut threats = self.threats.write().await;
        threats.push_front(threat);
        while threats.len() > self.capacity {
            if let Some(evicted) = threats.pop_back() {
                tracing::debug!(threat_id = %evicted.id, "evicted oldest threat from history");
            }
        }
    }

    /// Threat history, most recent first
    pub async fn recent_threats(&self) -> Vec<Threat> {
        self.threats.read().await.iter().cloned().collect()
    }

    pub async fn threat_count(&self) -> usize {
        self.threats.read().await.len()
    }

    /// Triage a threat. Only pending threats may transition.
    pub async fn set_threat_status(
        &self,
        id: Uuid,
        status: ThreatStatus,
    ) -> Result<Threat, ApiError> {
        let mut threats = self.threats.write().await;
        let threat = threats
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::not_found(format!("threat {} not found", id)))?;

        if threat.status != ThreatStatus::Pending {
            return Err(ApiError::conflict(format!(
                "threat {} has already been triaged",
                id
            )));
        }

        threat.status = status;
        Ok(threat.clone())
    }

    pub async fn add_target(&self, source: String, target: String) -> MonitoringTarget {
        let entry = MonitoringTarget {
            id: Uuid::new_v4(),
            source,
            target,
            enabled: true,
            created_at: Utc::now(),
        };
        self.targets.write().await.push(entry.clone());
        entry
    }

    pub async fn list_targets(&self) -> Vec<MonitoringTarget> {
        self.targets.read().await.clone()
    }

    pub async fn remove_target(&self, id: Uuid) -> bool {
        let mut targets = self.targets.write().await;
        let before = targets.len();
        targets.retain(|t| t.id != id);
        targets.len() < before
    }

    pub async fn toggle_target(&self, id: Uuid) -> Option<MonitoringTarget> {
        let mut targets = self.targets.write().await;
        let target = targets.iter_mut().find(|t| t.id == id)?;
        target.enabled = !target.enabled;
        Some(target.clone())
    }

    /// A source is polled unless every registry entry for it is disabled.
    /// A source with no registry entries is considered enabled.
    pub async fn source_enabled(&self, source: &str) -> bool {
        let targets = self.targets.read().await;
        let mut found = false;
        for target in targets.iter().filter(|t| t.source == source) {
            if target.enabled {
                return true;
            }
            found = true;
        }
        !found
    }

    pub async fn insert_report(&self, report: ScanReport) {
        self.reports.write().await.push(report);
    }

    pub async fn list_reports(&self) -> Vec<ScanReport> {
        self.reports.read().await.clone()
    }

    pub async fn get_report(&self, id: Uuid) -> Option<ScanReport> {
        self.reports.read().await.iter().find(|r| r.id == id).cloned()
    }
}
