use crate::error::ApiError;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the HTTP prober
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub request_timeout: Duration,
    pub banner_timeout: Duration,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            banner_timeout: Duration::from_secs(2),
            user_agent: "SecOps-Scanner/1.0".to_string(),
        }
    }
}

/// Outcome of the reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    pub reachable: bool,
    pub secure: bool,
}

/// Probes targets over HTTP(S): reachability, per-port banners, response headers.
///
/// Certificate validation is disabled on purpose: a broken certificate is a
/// finding to report, not a reason to abort the probe.
pub struct HttpProber {
    client: Client,
    config: ProbeConfig,
}

impl HttpProber {
    pub fn new(config: ProbeConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    /// Try HTTPS first, then plain HTTP. Any HTTP response, including an
    /// error status, counts as reachable; only a double connection-level
    /// failure is fatal.
    pub async fn check_reachability(&self, target: &str) -> Result<Reachability, ApiError> {
        let https_url = format!("https://{}", target);
        match self
            .client
            .get(&https_url)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!(target = %target, status = %response.status(), "target reachable over https");
                return Ok(Reachability {
                    reachable: true,
                    secure: true,
                });
            }
            Err(e) => {
                tracing::debug!(target = %target, error = %e, "https probe failed, falling back to http");
            }
        }

        let http_url = format!("http://{}", target);
        match self
            .client
            .get(&http_url)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!(target = %target, status = %response.status(), "target reachable over http");
                Ok(Reachability {
                    reachable: true,
                    secure: false,
                })
            }
            Err(e) => Err(ApiError::target_unreachable(format!(
                "target {} did not respond over https or http: {}",
                target, e
            ))),
        }
    }

    /// Grab response headers from a single port with a short timeout.
    /// Any status is acceptable; the headers are the banner.
    pub async fn grab_banner(
        &self,
        target: &str,
        port: u16,
    ) -> Result<HashMap<String, String>, ApiError> {
        let url = format!("http://{}:{}", target, port);
        let response = self
            .client
            .get(&url)
            .timeout(self.config.banner_timeout)
            .send()
            .await?;

        Ok(header_map_to_strings(response.headers()))
    }

    /// Fetch response headers over the transport that succeeded during the
    /// reachability probe. Any status is accepted.
    pub async fn fetch_headers(
        &self,
        target: &str,
        secure: bool,
    ) -> Result<HashMap<String, String>, ApiError> {
        let scheme = if secure { "https" } else { "http" };
        let url = format!("{}://{}", scheme, target);
        let response = self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        Ok(header_map_to_strings(response.headers()))
    }
}

/// Flatten a reqwest header map into lowercase name -> value strings
fn header_map_to_strings(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}
