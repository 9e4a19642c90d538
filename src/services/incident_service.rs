use crate::error::ApiError;
use crate::models::{Incident, IncidentCreate, IncidentStatus, MonitoringTarget, Severity, Threat};
use crate::services::external::EnrichmentClient;
use crate::store::IncidentRepository;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Escalates high-confidence threats into incidents and drives incident
/// response through the enrichment service.
pub struct IncidentService {
    repo: Arc<dyn IncidentRepository + Send + Sync>,
    enrichment: Arc<EnrichmentClient>,
}

impl IncidentService {
    pub fn new(
        repo: Arc<dyn IncidentRepository + Send + Sync>,
        enrichment: Arc<EnrichmentClient>,
    ) -> Self {
        Self { repo, enrichment }
    }

    /// Create a critical incident for a threat unless one already exists for
    /// it. Repeated escalation of the same threat is a no-op.
    pub async fn escalate(&self, threat: &Threat) -> Result<Option<Incident>, ApiError> {
        if let Some(existing) = self.repo.find_by_threat(threat.id).await? {
            tracing::debug!(
                threat_id = %threat.id,
                incident_id = %existing.id,
                "threat already escalated, skipping"
            );
            return Ok(None);
        }

        let recommendations = threat
            .analysis
            .as_ref()
            .map(|a| a.recommendations.clone())
            .unwrap_or_default();

        let incident = self
            .repo
            .create(IncidentCreate {
                title: format!("High Confidence Threat: {}", threat.threat_type),
                description: threat.description.clone(),
                source: threat.source.clone(),
                severity: threat.severity,
                status: IncidentStatus::Critical,
                recommendations,
                threat_id: Some(threat.id),
            })
            .await?;

        tracing::info!(
            incident_id = %incident.id,
            threat_id = %threat.id,
            severity = %incident.severity,
            "threat escalated to incident"
        );

        Ok(Some(incident))
    }

    /// Respond to an incident: obtain contextual recommendations, append them
    /// and mark the incident resolved. An unknown id is a logged no-op.
    pub async fn handle(&self, id: Uuid) -> Result<Option<Incident>, ApiError> {
        let Some(incident) = self.repo.get(id).await? else {
            tracing::warn!(incident_id = %id, "handle requested for unknown incident");
            return Ok(None);
        };

        let analysis = self
            .enrichment
            .analyze(
                "incident",
                json!({
                    "title": incident.title,
                    "description": incident.description,
                    "source": incident.source,
                    "severity": incident.severity,
                }),
            )
            .await;

        let resolved = self
            .repo
            .resolve_with_recommendations(id, analysis.recommendations)
            .await?;

        if let Some(incident) = &resolved {
            tracing::info!(incident_id = %incident.id, "incident handled and resolved");
        }

        Ok(resolved)
    }

    /// Registering a monitoring target is itself recorded as a low-severity
    /// active incident.
    pub async fn record_target_added(
        &self,
        target: &MonitoringTarget,
    ) -> Result<Incident, ApiError> {
        self.repo
            .create(IncidentCreate {
                title: "New Monitoring Target Added".to_string(),
                description: format!(
                    "Target {} is now monitored via the {} source",
                    target.target, target.source
                ),
                source: target.source.clone(),
                severity: Severity::Low,
                status: IncidentStatus::Active,
                recommendations: Vec::new(),
                threat_id: None,
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<Incident>, ApiError> {
        self.repo.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreatAnalysis;
    use crate::store::InMemoryIncidentRepository;
    use std::time::Duration;

    fn service() -> IncidentService {
        // Port 1 is closed; enrichment degrades to its deterministic fallback
        let enrichment = Arc::new(
            EnrichmentClient::new("http://127.0.0.1:1", None, Duration::from_millis(200)).unwrap(),
        );
        IncidentService::new(Arc::new(InMemoryIncidentRepository::new()), enrichment)
    }

    fn high_confidence_threat() -> Threat {
        let mut threat = Threat::new(
            "Lateral Movement",
            Severity::High,
            "edr",
            "credential reuse across hosts",
        );
        threat.analysis = Some(ThreatAnalysis {
            confidence: 0.95,
            recommendations: vec!["Isolate the host".to_string()],
            summary: "likely compromise".to_string(),
        });
        threat
    }

    #[tokio::test]
    async fn escalation_creates_a_critical_incident() {
        let service = service();
        let threat = high_confidence_threat();

        let incident = service.escalate(&threat).await.unwrap().unwrap();

        assert_eq!(incident.status, IncidentStatus::Critical);
        assert_eq!(incident.threat_id, Some(threat.id));
        assert_eq!(incident.recommendations, vec!["Isolate the host"]);
        assert!(incident.title.contains("Lateral Movement"));
    }

    #[tokio::test]
    async fn escalation_is_idempotent_per_threat() {
        let service = service();
        let threat = high_confidence_threat();

        let first = service.escalate(&threat).await.unwrap();
        let second = service.escalate(&threat).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handling_resolves_and_appends_recommendations() {
        let service = service();
        let threat = high_confidence_threat();
        let incident = service.escalate(&threat).await.unwrap().unwrap();

        let resolved = service.handle(incident.id).await.unwrap().unwrap();

        assert_eq!(resolved.status, IncidentStatus::Resolved);
        // Original recommendation kept, fallback guidance appended
        assert_eq!(resolved.recommendations[0], "Isolate the host");
        assert!(resolved.recommendations.len() > 1);
    }

    #[tokio::test]
    async fn handling_unknown_incident_is_a_noop() {
        let service = service();
        let result = service.handle(Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn target_registration_records_an_active_incident() {
        let service = service();
        let target = MonitoringTarget {
            id: Uuid::new_v4(),
            source: "siem".to_string(),
            target: "10.0.0.5".to_string(),
            enabled: true,
            created_at: chrono::Utc::now(),
        };

        let incident = service.record_target_added(&target).await.unwrap();

        assert_eq!(incident.status, IncidentStatus::Active);
        assert_eq!(incident.severity, Severity::Low);
        assert_eq!(incident.title, "New Monitoring Target Added");
    }
}
