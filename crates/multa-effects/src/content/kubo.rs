//! Kubo-compatible node API (`/api/v0`).

use super::{body_stream, trim_base};
use async_trait::async_trait;
use multa_core::{ChunkStream, ContentNodeEffects, EvidenceCid, MultaError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionResponse {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

/// Primary content node reached through its HTTP API.
///
/// Uploads are pinned and produce version-0 identifiers.
#[derive(Debug, Clone)]
pub struct KuboContentNode {
    client: reqwest::Client,
    api_url: String,
}

impl KuboContentNode {
    /// Node at `api_url`, e.g. `http://127.0.0.1:5001`.
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: trim_base(api_url),
        }
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.api_url, command)
    }

    async fn post(&self, request: reqwest::RequestBuilder, command: &str) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            MultaError::store_unavailable(format!("Failed to reach content node: {}", e))
        })?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            Err(MultaError::store_unavailable(format!(
                "Content node rejected {}: {} {}",
                command,
                status,
                detail.trim()
            )))
        }
    }
}

#[async_trait]
impl ContentNodeEffects for KuboContentNode {
    async fn version(&self) -> Result<String> {
        let response = self
            .post(self.client.post(self.endpoint("version")), "version")
            .await?;
        let body: VersionResponse = response.json().await.map_err(|e| {
            MultaError::store_unavailable(format!("Failed to parse version response: {}", e))
        })?;
        tracing::debug!(version = %body.version, "Content node reachable");
        Ok(body.version)
    }

    async fn add(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.endpoint("add"))
            .query(&[("cid-version", "0"), ("pin", "true")])
            .multipart(form);
        let response = self.post(request, "add").await?;
        let body: AddResponse = response.json().await.map_err(|e| {
            MultaError::store_unavailable(format!("Failed to parse add response: {}", e))
        })?;
        Ok(body.hash)
    }

    async fn cat(&self, cid: &EvidenceCid) -> Result<ChunkStream> {
        let request = self
            .client
            .post(self.endpoint("cat"))
            .query(&[("arg", cid.as_str())]);
        let response = self.post(request, "cat").await?;
        Ok(body_stream(response))
    }
}
