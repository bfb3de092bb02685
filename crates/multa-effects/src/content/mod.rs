//! Content-node handlers: the node's HTTP API as primary path and a
//! public HTTP gateway as read-only fallback.

mod gateway;
mod kubo;

pub use gateway::GatewayContentNode;
pub use kubo::KuboContentNode;

use futures::{StreamExt, TryStreamExt};
use multa_core::{ChunkStream, MultaError};

/// Adapt a response body into a chunk stream; transport errors mid-stream
/// become `StoreUnavailable`.
pub(crate) fn body_stream(response: reqwest::Response) -> ChunkStream {
    response
        .bytes_stream()
        .map_ok(|chunk| chunk.to_vec())
        .map_err(|e| MultaError::store_unavailable(format!("Stream interrupted: {}", e)))
        .boxed()
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
