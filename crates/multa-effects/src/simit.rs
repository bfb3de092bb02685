//! HTTP client for the external SIMIT registry.

use async_trait::async_trait;
use multa_core::{MultaError, Result, SimitConfig, SimitEffects, SimitFine};
use reqwest::StatusCode;
use std::time::Duration;

/// SIMIT lookup over its REST API.
///
/// `GET {base}/fines?plate=<plate>` lists fines, `GET {base}/health` is the
/// connectivity probe. The optional API key is sent as a bearer token.
#[derive(Clone)]
pub struct SimitHttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for SimitHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimitHttpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SimitHttpClient {
    /// Build a client with the configured request timeout.
    pub fn from_config(config: &SimitConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| MultaError::configuration(format!("Failed to build SIMIT client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl SimitEffects for SimitHttpClient {
    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<SimitFine>> {
        let response = self
            .get("/fines")
            .query(&[("plate", plate_number)])
            .send()
            .await
            .map_err(|e| MultaError::internal(format!("Failed to reach SIMIT: {}", e)))?;

        match response.status() {
            status if status.is_success() => response.json().await.map_err(|e| {
                MultaError::serialization(format!("Failed to parse SIMIT response: {}", e))
            }),
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status => Err(MultaError::internal(format!(
                "SIMIT rejected lookup for {}: {}",
                plate_number, status
            ))),
        }
    }

    async fn check_connection(&self) -> bool {
        match self.get("/health").send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("SIMIT health probe failed: {}", e);
                false
            }
        }
    }
}
