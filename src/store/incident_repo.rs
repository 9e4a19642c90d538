use crate::error::ApiError;
use crate::models::{Incident, IncidentCreate, IncidentStatus};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence boundary for incidents
#[async_trait]
pub trait IncidentRepository {
    async fn create(&self, incident: IncidentCreate) -> Result<Incident, ApiError>;
    async fn get(&self, id: Uuid) -> Result<Option<Incident>, ApiError>;
    async fn list(&self) -> Result<Vec<Incident>, ApiError>;
    async fn find_by_threat(&self, threat_id: Uuid) -> Result<Option<Incident>, ApiError>;
    async fn resolve_with_recommendations(
        &self,
        id: Uuid,
        recommendations: Vec<String>,
    ) -> Result<Option<Incident>, ApiError>;
}

/// In-memory incident repository
#[derive(Default)]
pub struct InMemoryIncidentRepository {
    incidents: RwLock<Vec<Incident>>,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn create(&self, incident: IncidentCreate) -> Result<Incident, ApiError> {
        let incident: Incident = incident.into();
        self.incidents.write().await.push(incident.clone());
        Ok(incident)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, ApiError> {
        Ok(self
            .incidents
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Incident>, ApiError> {
        Ok(self.incidents.read().await.clone())
    }

    async fn find_by_threat(&self, threat_id: Uuid) -> Result<Option<Incident>, ApiError> {
        Ok(self
            .incidents
            .read()
            .await
            .iter()
            .find(|i| i.threat_id == Some(threat_id))
            .cloned())
    }

    async fn resolve_with_recommendations(
        &self,
        id: Uuid,
        recommendations: Vec<String>,
    ) -> Result<Option<Incident>, ApiError> {
        let mut incidents = self.incidents.write().await;
        let Some(incident) = incidents.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };

        // Recommendations are append-only
        incident.recommendations.extend(recommendations);
        incident.status = IncidentStatus::Resolved;
        incident.updated_at = Utc::now();
        Ok(Some(incident.clone()))
    }
}
