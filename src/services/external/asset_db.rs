use crate::error::ApiError;
use crate::services::external::RateLimitedClient;
use serde::Deserialize;

/// Record returned by the passive-recon asset database
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDbRecord {
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Client for the passive-recon asset database (open port lookups by host)
pub struct AssetDbClient {
    client: RateLimitedClient,
    base_url: String,
    api_key: Option<String>,
}

impl AssetDbClient {
    pub fn new(
        client: RateLimitedClient,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Look up known open ports for a target. A 404 means the database has
    /// no record for the host, which is an empty result, not an error.
    pub async fn lookup_ports(&self, target: &str) -> Result<Vec<u16>, ApiError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(target)
        );

        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = &self.api_key {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(key) {
                headers.insert("x-api-key", value);
            }
        }

        let response = match self.client.get_with_headers(&url, headers).await {
            Ok(response) => response,
            Err(ApiError::ExternalService(msg)) if msg.contains("404") => {
                tracing::debug!(target = %target, "asset database has no record for target");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let record: AssetDbRecord = response.json().await?;
        tracing::debug!(
            target = %target,
            port_count = record.ports.len(),
            "asset database lookup complete"
        );

        Ok(record.ports)
    }
}
