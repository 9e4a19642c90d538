use crate::error::ApiError;
use crate::services::external::RateLimitedClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    vulnerabilities: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    cve: FeedCve,
}

#[derive(Debug, Deserialize)]
struct FeedCve {
    id: String,
    #[serde(default)]
    descriptions: Vec<FeedDescription>,
    metrics: Option<FeedMetrics>,
}

#[derive(Debug, Deserialize)]
struct FeedDescription {
    lang: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    cvss_metric_v31: Vec<FeedCvssMetric>,
}

#[derive(Debug, Deserialize)]
struct FeedCvssMetric {
    #[serde(rename = "cvssData")]
    cvss_data: Option<FeedCvssData>,
}

#[derive(Debug, Deserialize)]
struct FeedCvssData {
    #[serde(rename = "baseScore")]
    base_score: Option<f64>,
    #[serde(rename = "vectorString")]
    vector_string: Option<String>,
}

/// A feed entry flattened to the fields the correlator needs
#[derive(Debug, Clone)]
pub struct CveEntry {
    pub id: String,
    pub description: String,
    pub score: f64,
    pub vector: Option<String>,
}

/// Client for the CVSS-scored vulnerability feed
pub struct CveFeedClient {
    client: RateLimitedClient,
    base_url: String,
}

impl CveFeedClient {
    pub fn new(client: RateLimitedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Search the feed by service identity. Entries without a CVSS v3.1 score
    /// are dropped; score thresholds are the correlator's concern.
    pub async fn search(&self, service: &str, version: &str) -> Result<Vec<CveEntry>, ApiError> {
        let keyword = format!("{} {}", service, version);
        let url = format!(
            "{}?keywordSearch={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&keyword)
        );

        let response = self.client.get(&url).await?;
        let body: FeedResponse = response.json().await?;

        let entries: Vec<CveEntry> = body
            .vulnerabilities
            .into_iter()
            .filter_map(|item| {
                let score_data = item
                    .cve
                    .metrics
                    .as_ref()?
                    .cvss_metric_v31
                    .first()?
                    .cvss_data
                    .as_ref()?;
                let score = score_data.base_score?;

                let description = item
                    .cve
                    .descriptions
                    .iter()
                    .find(|d| d.lang.as_deref() == Some("en"))
                    .or_else(|| item.cve.descriptions.first())
                    .and_then(|d| d.value.clone())
                    .unwrap_or_default();

                Some(CveEntry {
                    id: item.cve.id,
                    description,
                    score,
                    vector: score_data.vector_string.clone(),
                })
            })
            .collect();

        tracing::debug!(
            service = %service,
            version = %version,
            entries = entries.len(),
            "CVE feed search complete"
        );

        Ok(entries)
    }
}
