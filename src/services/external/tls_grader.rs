use crate::error::ApiError;
use crate::models::TlsAssessment;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct GraderResponse {
    status: Option<String>,
    #[serde(default)]
    endpoints: Vec<GraderEndpoint>,
}

#[derive(Debug, Deserialize)]
struct GraderEndpoint {
    grade: Option<String>,
    details: Option<GraderDetails>,
}

#[derive(Debug, Deserialize)]
struct GraderDetails {
    cert: Option<GraderCert>,
    #[serde(default)]
    protocols: Vec<GraderProtocol>,
}

#[derive(Debug, Deserialize)]
struct GraderCert {
    /// Certificate expiry as epoch milliseconds
    #[serde(rename = "notAfter")]
    not_after: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GraderProtocol {
    name: Option<String>,
    version: Option<String>,
}

/// Client for the external TLS grading service. An assessment is started and
/// then polled until the service reports a terminal state.
pub struct TlsGraderClient {
    client: Client,
    base_url: String,
    poll_attempts: u32,
    poll_delay: Duration,
}

impl TlsGraderClient {
    pub fn new(
        base_url: impl Into<String>,
        poll_attempts: u32,
        poll_delay: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("SecOps-Backend/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            poll_attempts,
            poll_delay,
        })
    }

    /// Assess the TLS posture of a hostname.
    ///
    /// Transport failures and a terminal ERROR state degrade to the
    /// conservative default assessment. Exhausting the poll budget is the one
    /// error surfaced to the caller.
    pub async fn assess(&self, hostname: &str) -> Result<TlsAssessment, ApiError> {
        let url = format!(
            "{}/analyze?host={}&all=done",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(hostname)
        );

        for attempt in 0..self.poll_attempts {
            if attempt > 0 {
                sleep(self.poll_delay).await;
            }

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(hostname = %hostname, error = %e, "TLS grader unreachable, using conservative default");
                    return Ok(TlsAssessment::unknown());
                }
            };

            let body: GraderResponse = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(hostname = %hostname, error = %e, "TLS grader returned malformed body, using conservative default");
                    return Ok(TlsAssessment::unknown());
                }
            };

            match body.status.as_deref() {
                Some("READY") => {
                    return Ok(assessment_from_response(&body));
                }
                Some("ERROR") => {
                    tracing::warn!(hostname = %hostname, "TLS grader reported assessment error, using conservative default");
                    return Ok(TlsAssessment::unknown());
                }
                other => {
                    tracing::debug!(
                        hostname = %hostname,
                        status = other.unwrap_or("none"),
                        attempt = attempt + 1,
                        "TLS assessment still in progress"
                    );
                }
            }
        }

        Err(ApiError::timeout(format!(
            "TLS assessment for {} did not reach a terminal state after {} attempts",
            hostname, self.poll_attempts
        )))
    }
}

fn assessment_from_response(body: &GraderResponse) -> TlsAssessment {
    let endpoint = body.endpoints.first();

    let grade = endpoint
        .and_then(|e| e.grade.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let days_until_expiry = endpoint
        .and_then(|e| e.details.as_ref())
        .and_then(|d| d.cert.as_ref())
        .and_then(|c| c.not_after)
        .map(|not_after_ms| {
            let now_ms = chrono::Utc::now().timestamp_millis();
            (not_after_ms - now_ms) / 86_400_000
        });

    let protocols = endpoint
        .and_then(|e| e.details.as_ref())
        .map(|d| {
            d.protocols
                .iter()
                .filter_map(|p| match (&p.name, &p.version) {
                    (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
                    (Some(name), None) => Some(name.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let valid = grade != "Unknown" && days_until_expiry.map_or(false, |d| d > 0);

    TlsAssessment {
        valid,
        days_until_expiry,
        protocols,
        grade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, attempts: u32) -> TlsGraderClient {
        TlsGraderClient::new(
            server.uri(),
            attempts,
            Duration::from_millis(10),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ready_assessment_is_mapped() {
        let mock_server = MockServer::start().await;

        let expiry_ms = chrono::Utc::now().timestamp_millis() + 90 * 86_400_000;
        Mock::given(method("GET"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "READY",
                "endpoints": [{
                    "grade": "A",
                    "details": {
                        "cert": { "notAfter": expiry_ms },
                        "protocols": [
                            { "name": "TLS", "version": "1.2" },
                            { "name": "TLS", "version": "1.3" }
                        ]
                    }
                }]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, 3);
        let assessment = client.assess("example.test").await.unwrap();

        assert!(assessment.valid);
        assert_eq!(assessment.grade, "A");
        assert!(assessment.days_until_expiry.unwrap() >= 89);
        assert_eq!(assessment.protocols, vec!["TLS 1.2", "TLS 1.3"]);
    }

    #[tokio::test]
    async fn polls_until_ready() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "IN_PROGRESS"
            })))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "READY",
                "endpoints": [{ "grade": "B" }]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, 5);
        let assessment = client.assess("example.test").await.unwrap();

        assert_eq!(assessment.grade, "B");
    }

    #[tokio::test]
    async fn error_state_degrades_to_conservative_default() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ERROR"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, 3);
        let assessment = client.assess("example.test").await.unwrap();

        assert!(!assessment.valid);
        assert_eq!(assessment.grade, "Unknown");
        assert!(assessment.protocols.is_empty());
    }

    #[tokio::test]
    async fn exhausted_poll_budget_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "IN_PROGRESS"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, 2);
        let result = client.assess("example.test").await;

        assert!(matches!(result, Err(ApiError::Timeout(_))));
    }
}
