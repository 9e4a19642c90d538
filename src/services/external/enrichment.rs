use crate::error::ApiError;
use crate::models::ThreatAnalysis;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct EnrichmentResponse {
    confidence: f64,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    summary: String,
}

/// Client for the opaque risk-scoring oracle.
///
/// Enrichment is best-effort: every failure path lands in the deterministic
/// local fallback, so callers never see an error from this client.
pub struct EnrichmentClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl EnrichmentClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("SecOps-Backend/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Score a piece of security context. `kind` tells the oracle what it is
    /// looking at ("threat" or "incident").
    pub async fn analyze(&self, kind: &str, content: serde_json::Value) -> ThreatAnalysis {
        let url = format!("{}/analyze", self.base_url.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&json!({
            "type": kind,
            "content": content,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "enrichment service unreachable, using local fallback");
                return fallback_analysis();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(kind = %kind, status = %response.status(), "enrichment service returned an error, using local fallback");
            return fallback_analysis();
        }

        match response.json::<EnrichmentResponse>().await {
            Ok(body) => ThreatAnalysis {
                confidence: body.confidence.clamp(0.0, 1.0),
                recommendations: body.recommendations,
                summary: body.summary,
            },
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "enrichment response malformed, using local fallback");
                fallback_analysis()
            }
        }
    }
}

/// Deterministic analysis used whenever the enrichment service degrades
pub fn fallback_analysis() -> ThreatAnalysis {
    ThreatAnalysis {
        confidence: 0.5,
        recommendations: vec![
            "Monitor system activity".to_string(),
            "Review security logs".to_string(),
            "Enable additional security controls".to_string(),
        ],
        summary: "Automated analysis unavailable; applying standard response guidance".to_string(),
    }
}
