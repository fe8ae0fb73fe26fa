pub mod auth;
pub mod devices;
pub mod users;

use crate::config::ConfigManager;
use crate::error::{Cat365Error, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30000;
const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Exponential backoff with jitter, capped at MAX_BACKOFF_MS
fn backoff_with_jitter(attempt: u32) -> Duration {
    let capped = (INITIAL_BACKOFF_MS * 2u64.pow(attempt)).min(MAX_BACKOFF_MS);

    let jitter_range = (capped as f64 * JITTER_FACTOR) as u64;
    let jitter = if jitter_range > 0 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::time::SystemTime::now().hash(&mut hasher);
        (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
    } else {
        0
    };

    Duration::from_millis((capped as i64 + jitter).max(100) as u64)
}

/// Graph API client with transient-failure retry
///
/// Retries 429 (honoring Retry-After), 5xx (exponential backoff with
/// jitter), and connection errors. 4xx responses are returned immediately
/// with the parsed Graph error body.
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, GRAPH_API_BASE)
    }

    /// Construct a client against a non-default base URL (mock servers, sovereign clouds)
    pub fn with_base_url(access_token: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a GraphClient for the named tenant, loading its cached token
    pub async fn from_config(config: &ConfigManager, tenant_name: &str) -> Result<Self> {
        let graph_auth = auth::GraphAuth::new(config.clone());
        let access_token = graph_auth.get_access_token(tenant_name).await?;

        Ok(Self::new(access_token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Make a GET request to Graph API
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        self.get_raw_url(&url).await
    }

    /// Make a POST request to Graph API
    pub async fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.url(endpoint);
        let resp = self
            .execute_with_retry("POST", &url, || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .json(body)
            })
            .await?;
        Ok(resp.json::<R>().await?)
    }

    /// Make a PUT request to Graph API, discarding the response body
    ///
    /// Reference ($ref) writes such as the device category assignment
    /// answer 204 No Content on success.
    pub async fn put<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<()> {
        let url = self.url(endpoint);
        self.execute_with_retry("PUT", &url, || {
            self.client
                .put(&url)
                .bearer_auth(&self.access_token)
                .json(body)
        })
        .await?;
        Ok(())
    }

    /// GET an absolute URL (used to follow @odata.nextLink)
    async fn get_raw_url<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let resp = self
            .execute_with_retry("GET", url, || {
                self.client.get(url).bearer_auth(&self.access_token)
            })
            .await?;
        Ok(resp.json::<T>().await?)
    }

    /// Send a request, retrying transient failures
    async fn execute_with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(INITIAL_BACKOFF_MS / 1000);

                        tracing::warn!(
                            "Rate limited (429). Retrying in {} seconds... (attempt {}/{})",
                            retry_after,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        continue;
                    }

                    if status.is_server_error() && attempt < MAX_RETRIES - 1 {
                        let wait_time = backoff_with_jitter(attempt);
                        tracing::warn!(
                            "Server error ({}). Retrying in {:?}... (attempt {}/{})",
                            status,
                            wait_time,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = resp.text().await.unwrap_or_default();
                        let enhanced_error = crate::error::enhance_graph_error(&error_text);
                        return Err(Cat365Error::GraphApiError(format!(
                            "HTTP {}: {}",
                            status, enhanced_error
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if attempt < MAX_RETRIES - 1 {
                        let wait_time = backoff_with_jitter(attempt);
                        tracing::warn!(
                            "Connection error: {}. Retrying in {:?}... (attempt {}/{})",
                            e,
                            wait_time,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait_time).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(|e| e.into()).unwrap_or_else(|| {
            Cat365Error::GraphApiError(format!(
                "{} {} failed after {} retries",
                method, url, MAX_RETRIES
            ))
        }))
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Standard OData paginated response: `value` array plus `@odata.nextLink`
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl GraphClient {
    /// Fetch every page of a paginated endpoint
    ///
    /// Follows `@odata.nextLink` until absent. Any page failing to fetch
    /// fails the whole call; callers that need the complete result set
    /// (e.g. reference data) must not act on a partial one.
    pub async fn get_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = self.url(endpoint);

        loop {
            let response: PaginatedResponse<T> = self.get_raw_url(&current_url).await?;
            all_items.extend(response.value);

            match response.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let first = backoff_with_jitter(0);
        assert!(first >= Duration::from_millis(100));
        // attempt 10 would be 1024s uncapped; jitter keeps it within 30% of the cap
        let capped = backoff_with_jitter(10);
        assert!(capped <= Duration::from_millis(MAX_BACKOFF_MS + MAX_BACKOFF_MS * 3 / 10));
    }

    #[test]
    fn test_url_join_normalizes_slashes() {
        let client = GraphClient::with_base_url("t".into(), "https://example.test/v1.0/");
        assert_eq!(
            client.url("/deviceManagement/deviceCategories"),
            "https://example.test/v1.0/deviceManagement/deviceCategories"
        );
    }
}
