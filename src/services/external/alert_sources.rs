use crate::error::ApiError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Log-search envelope returned by the SIEM source
#[derive(Debug, Deserialize)]
struct LogSearchResponse {
    hits: LogHits,
}

#[derive(Debug, Deserialize)]
struct LogHits {
    #[serde(default)]
    hits: Vec<LogHitEnvelope>,
}

#[derive(Debug, Deserialize)]
struct LogHitEnvelope {
    #[serde(rename = "_source")]
    source: LogHit,
}

/// One SIEM log hit, as stored in the search index
#[derive(Debug, Clone, Deserialize)]
pub struct LogHit {
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdsAlertResponse {
    #[serde(default)]
    alerts: Vec<IdsAlert>,
}

/// One alert from the network intrusion detection source
#[derive(Debug, Clone, Deserialize)]
pub struct IdsAlert {
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EndpointStatusResponse {
    #[serde(default)]
    endpoints: Vec<EndpointStatus>,
}

/// One status event from the endpoint detection source
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointStatus {
    #[serde(rename = "type")]
    pub status_type: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
}

/// Client for the three heterogeneous alert feeds behind the alert API
pub struct AlertSourceClient {
    client: Client,
    base_url: String,
}

impl AlertSourceClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("SecOps-Backend/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub async fn fetch_log_hits(&self, query: &str) -> Result<Vec<LogHit>, ApiError> {
        let url = format!(
            "{}/siem/logs?query={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(query)
        );
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: LogSearchResponse = response.json().await?;

        Ok(body.hits.hits.into_iter().map(|h| h.source).collect())
    }

    pub async fn fetch_ids_alerts(&self) -> Result<Vec<IdsAlert>, ApiError> {
        let url = format!("{}/ids/alerts", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: IdsAlertResponse = response.json().await?;

        Ok(body.alerts)
    }

    pub async fn fetch_endpoint_status(&self) -> Result<Vec<EndpointStatus>, ApiError> {
        let url = format!("{}/endpoint/status", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: EndpointStatusResponse = response.json().await?;

        Ok(body.endpoints)
    }
}

/// Degrade a failed source poll to an empty batch. An unavailable feed must
/// never take the monitoring loop down.
pub fn empty_on_failure<T>(result: Result<Vec<T>, ApiError>, source: &str) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "alert source unavailable, continuing with empty batch");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AlertSourceClient {
        AlertSourceClient::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn log_hits_are_unwrapped_from_the_search_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/siem/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "hits": [
                        { "_source": { "alert_type": "Brute Force", "severity": "high", "description": "repeated failures" } }
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let hits = client.fetch_log_hits("severity:high").await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].alert_type.as_deref(), Some("Brute Force"));
    }

    #[tokio::test]
    async fn ids_alerts_are_fetched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ids/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [
                    { "type": "Port Scan", "severity": "medium", "description": "sweep detected" }
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let alerts = client.fetch_ids_alerts().await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type.as_deref(), Some("Port Scan"));
    }

    #[tokio::test]
    async fn endpoint_status_is_fetched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/endpoint/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "endpoints": [
                    { "type": "Malware Detected", "severity": "critical", "description": "trojan quarantined" }
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let events = client.fetch_endpoint_status().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity.as_deref(), Some("critical"));
    }

    #[tokio::test]
    async fn failed_source_degrades_to_empty_batch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let hits = empty_on_failure(client.fetch_log_hits("x").await, "siem");

        assert!(hits.is_empty());
    }
}
