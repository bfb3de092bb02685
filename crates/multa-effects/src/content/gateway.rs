//! Read-only HTTP gateway (`/ipfs/<cid>`).

use super::{body_stream, trim_base};
use async_trait::async_trait;
use multa_core::{ChunkStream, ContentNodeEffects, EvidenceCid, MultaError, Result};
use reqwest::StatusCode;

/// Public gateway used as the fallback retrieval path.
#[derive(Debug, Clone)]
pub struct GatewayContentNode {
    client: reqwest::Client,
    gateway_url: String,
}

impl GatewayContentNode {
    /// Gateway at `gateway_url`, e.g. `https://ipfs.io`.
    pub fn new(gateway_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: trim_base(gateway_url),
        }
    }

    fn content_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, cid)
    }
}

#[async_trait]
impl ContentNodeEffects for GatewayContentNode {
    async fn version(&self) -> Result<String> {
        let response = self
            .client
            .head(&self.gateway_url)
            .send()
            .await
            .map_err(|e| MultaError::store_unavailable(format!("Failed to reach gateway: {}", e)))?;
        Ok(format!("gateway ({})", response.status()))
    }

    async fn add(&self, _bytes: Vec<u8>, _name: &str) -> Result<String> {
        Err(MultaError::store_unavailable("Gateway path is read-only"))
    }

    async fn cat(&self, cid: &EvidenceCid) -> Result<ChunkStream> {
        let response = self
            .client
            .get(self.content_url(cid.as_str()))
            .send()
            .await
            .map_err(|e| MultaError::store_unavailable(format!("Failed to reach gateway: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(body_stream(response)),
            StatusCode::NOT_FOUND => Err(MultaError::not_found(format!(
                "No content found for CID {}",
                cid
            ))),
            status => Err(MultaError::store_unavailable(format!(
                "Gateway returned {} for {}",
                status, cid
            ))),
        }
    }
}
