//! Content-addressed store effect trait.
//!
//! One handler per network path: the primary node and the fallback path
//! implement the same trait and `EvidenceStore` chooses between them.

use crate::errors::Result;
use crate::evidence::EvidenceCid;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Stream of byte chunks in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// A content-addressed storage node.
#[async_trait]
pub trait ContentNodeEffects: Send + Sync {
    /// Probe the node, returning its version string.
    async fn version(&self) -> Result<String>;

    /// Store `bytes` and return the identifier the node derived from them.
    async fn add(&self, bytes: Vec<u8>, name: &str) -> Result<String>;

    /// Open a chunk stream for `cid`.
    async fn cat(&self, cid: &EvidenceCid) -> Result<ChunkStream>;
}

/// Blanket implementation for Arc<T> where T: ContentNodeEffects
#[async_trait]
impl<T: ContentNodeEffects + ?Sized> ContentNodeEffects for Arc<T> {
    async fn version(&self) -> Result<String> {
        (**self).version().await
    }

    async fn add(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        (**self).add(bytes, name).await
    }

    async fn cat(&self, cid: &EvidenceCid) -> Result<ChunkStream> {
        (**self).cat(cid).await
    }
}
