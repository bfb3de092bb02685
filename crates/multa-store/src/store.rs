//! Evidence store over two content-node paths.
//!
//! Uploads go to the primary node only. Retrieval tries the primary node,
//! then the fallback path, and the two attempts together are bounded by one
//! timeout. Chunks are kept in arrival order. Partial output from a failed
//! primary attempt is discarded rather than mixed with fallback output.

use crate::connection::ConnectionState;
use async_lock::RwLock;
use futures::TryStreamExt;
use multa_core::{
    ContentNodeEffects, EvidenceBlob, EvidenceCid, EvidenceConfig, MultaError, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bound on a whole retrieval, both paths combined.
pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(30);

fn unavailable(context: &str, err: MultaError) -> MultaError {
    match err {
        MultaError::StoreUnavailable { message } => {
            MultaError::store_unavailable(format!("{context}: {message}"))
        }
        other => MultaError::store_unavailable(format!("{context}: {other}")),
    }
}

/// Content-addressed evidence storage.
#[derive(Clone)]
pub struct EvidenceStore {
    primary: Arc<dyn ContentNodeEffects>,
    fallback: Arc<dyn ContentNodeEffects>,
    retrieval_timeout: Duration,
    connection: Arc<RwLock<ConnectionState>>,
}

impl std::fmt::Debug for EvidenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceStore")
            .field("retrieval_timeout", &self.retrieval_timeout)
            .finish_non_exhaustive()
    }
}

impl EvidenceStore {
    /// Store with the default 30 second retrieval bound.
    pub fn new(
        primary: Arc<dyn ContentNodeEffects>,
        fallback: Arc<dyn ContentNodeEffects>,
    ) -> Self {
        Self {
            primary,
            fallback,
            retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
            connection: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
        }
    }

    /// Store configured from the evidence section.
    pub fn from_config(
        config: &EvidenceConfig,
        primary: Arc<dyn ContentNodeEffects>,
        fallback: Arc<dyn ContentNodeEffects>,
    ) -> Self {
        Self::new(primary, fallback)
            .with_retrieval_timeout(Duration::from_millis(config.retrieval_timeout_ms))
    }

    /// Override the retrieval bound.
    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    /// Current primary connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.read().await.clone()
    }

    /// Probe the primary node and record the outcome.
    pub async fn connect(&self) -> Result<String> {
        *self.connection.write().await = ConnectionState::Connecting;
        let probe = self.primary.version().await;

        let mut state = self.connection.write().await;
        match probe {
            Ok(version) => {
                info!(version = %version, "Connected to primary content node");
                *state = ConnectionState::Connected {
                    version: version.clone(),
                };
                Ok(version)
            }
            Err(err) => {
                warn!(error = %err, "Primary content node probe failed");
                *state = ConnectionState::Failed {
                    reason: err.to_string(),
                };
                Err(unavailable("Primary node unreachable", err))
            }
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.connection.read().await.is_connected() {
            return Ok(());
        }
        self.connect().await.map(|_| ())
    }

    /// Non-throwing connectivity probe for health reporting.
    pub async fn is_connected(&self) -> bool {
        self.connect().await.is_ok()
    }

    /// Store `bytes` on the primary node.
    ///
    /// Identical bytes always yield the identical identifier.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<EvidenceCid> {
        self.ensure_connected().await?;
        let raw = self
            .primary
            .add(bytes, name)
            .await
            .map_err(|e| unavailable("Upload failed", e))?;
        let cid = EvidenceCid::parse(&raw).map_err(|_| {
            MultaError::store_unavailable(format!("Node returned a malformed identifier: {raw}"))
        })?;
        info!(cid = %cid, "Evidence uploaded");
        Ok(cid)
    }

    /// Validate `raw` as a CID, then retrieve it. Nothing touches the
    /// network when validation fails.
    pub async fn get_str(&self, raw: &str) -> Result<EvidenceBlob> {
        let cid = EvidenceCid::parse(raw)?;
        self.get(&cid).await
    }

    /// Retrieve a blob, primary path first, within the retrieval bound.
    #[tracing::instrument(skip(self, cid), fields(cid = %cid))]
    pub async fn get(&self, cid: &EvidenceCid) -> Result<EvidenceBlob> {
        match tokio::time::timeout(self.retrieval_timeout, self.retrieve(cid)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms =
                    u64::try_from(self.retrieval_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "Evidence retrieval timed out");
                Err(MultaError::retrieval_timeout(cid.as_str(), timeout_ms))
            }
        }
    }

    async fn retrieve(&self, cid: &EvidenceCid) -> Result<EvidenceBlob> {
        match self.read_primary(cid).await {
            Ok(chunks) if !chunks.is_empty() => {
                debug!(chunks = chunks.len(), "Served from primary node");
                return Ok(EvidenceBlob::new(cid.clone(), chunks));
            }
            Ok(_) => warn!("Primary node returned no content, trying fallback path"),
            Err(err) => warn!(error = %err, "Primary retrieval failed, trying fallback path"),
        }

        let chunks = self.read_fallback(cid).await?;
        if chunks.is_empty() {
            return Err(MultaError::not_found(format!("No content found for CID {cid}")));
        }
        debug!(chunks = chunks.len(), "Served from fallback path");
        Ok(EvidenceBlob::new(cid.clone(), chunks))
    }

    async fn read_primary(&self, cid: &EvidenceCid) -> Result<Vec<Vec<u8>>> {
        self.ensure_connected().await?;
        self.primary.cat(cid).await?.try_collect().await
    }

    async fn read_fallback(&self, cid: &EvidenceCid) -> Result<Vec<Vec<u8>>> {
        let stream = self
            .fallback
            .cat(cid)
            .await
            .map_err(|e| fallback_error(cid, e))?;
        stream
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| fallback_error(cid, e))
    }
}

fn fallback_error(cid: &EvidenceCid, err: MultaError) -> MultaError {
    match err {
        MultaError::NotFound { .. } => err,
        other => unavailable(&format!("Fallback retrieval of {cid} failed"), other),
    }
}
