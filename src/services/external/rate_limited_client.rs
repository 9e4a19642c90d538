use crate::error::ApiError;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Rate-limited HTTP client for external API integrations
pub struct RateLimitedClient {
    client: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::direct::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
    max_retries: u32,
    base_delay: Duration,
}

impl RateLimitedClient {
    /// Create a new rate-limited client
    pub fn new(requests_per_second: u32, max_retries: u32) -> Result<Self, ApiError> {
        Self::with_timeout(requests_per_second, max_retries, Duration::from_secs(30))
    }

    /// Create a new rate-limited client with a custom request timeout
    pub fn with_timeout(
        requests_per_second: u32,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).ok_or_else(|| {
            ApiError::Validation("requests_per_second must be greater than 0".to_string())
        })?);

        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("SecOps-Backend/1.0")
            .build()?;

        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            base_delay: Duration::from_millis(1000),
        })
    }

    /// Make a rate-limited GET request with retries
    pub async fn get(&self, url: &str) -> Result<Response, ApiError> {
        self.make_request(|client| client.get(url)).await
    }

    /// Make a rate-limited GET request with custom headers
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: reqwest::header::HeaderMap,
    ) -> Result<Response, ApiError> {
        self.make_request(|client| client.get(url).headers(headers.clone()))
            .await
    }

    /// Internal method to make requests with rate limiting and retries
    async fn make_request<F>(&self, request_builder: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> reqwest::RequestBuilder + Clone,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            // Wait for rate limit
            self.rate_limiter.until_ready().await;

            match request_builder(&self.client).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    } else if response.status().is_server_error() && attempt < self.max_retries {
                        let delay = self.base_delay * 2_u32.pow(attempt);
                        tracing::warn!(
                            "Server error {} on attempt {}, retrying in {:?}",
                            response.status(),
                            attempt + 1,
                            delay
                        );
                        sleep(delay).await;
                        continue;
                    } else {
                        // Client error or final server error
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        return Err(ApiError::ExternalService(format!(
                            "HTTP {} error: {}",
                            status, body
                        )));
                    }
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = self.base_delay * 2_u32.pow(attempt);
                        tracing::warn!(
                            "Request failed on attempt {}, retrying in {:?}: {}",
                            attempt + 1,
                            delay,
                            e
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(ApiError::HttpClient(e)),
            None => Err(ApiError::internal("request retries exhausted")),
        }
    }
}
