//! In-memory content-addressed node
//!
//! Identifiers are CIDv0 strings: base58 of the sha2-256 multihash of the
//! raw bytes. A real node hashes the UnixFS encoding instead, so identifiers
//! differ from what a live node would return for the same file, but the
//! content-addressing property is the same.

use async_lock::RwLock;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use multa_core::{ChunkStream, ContentNodeEffects, EvidenceCid, MultaError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Chunk size used by `cat` unless overridden.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// CIDv0 of `bytes` under this node's addressing scheme.
pub fn compute_cid_v0(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut multihash = Vec::with_capacity(34);
    multihash.extend_from_slice(&[0x12, 0x20]);
    multihash.extend_from_slice(&digest);
    bs58::encode(multihash).into_string()
}

#[derive(Debug, Default)]
struct NodeCounters {
    versions: AtomicUsize,
    adds: AtomicUsize,
    cats: AtomicUsize,
}

/// Content node holding blobs in memory.
#[derive(Debug, Clone)]
pub struct MemoryContentNode {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    chunk_size: usize,
    read_only: bool,
    offline: Arc<AtomicBool>,
    hang: Arc<AtomicBool>,
    counters: Arc<NodeCounters>,
}

impl Default for MemoryContentNode {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentNode {
    /// Empty writable node.
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_only: false,
            offline: Arc::new(AtomicBool::new(false)),
            hang: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(NodeCounters::default()),
        }
    }

    /// Split `cat` output into chunks of `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Refuse `add`, like an HTTP gateway.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Another node on the same network: shares content, has its own
    /// knobs and counters.
    pub fn peer(&self) -> Self {
        Self {
            blobs: self.blobs.clone(),
            chunk_size: self.chunk_size,
            read_only: self.read_only,
            offline: Arc::new(AtomicBool::new(false)),
            hang: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(NodeCounters::default()),
        }
    }

    /// Store bytes without counting the call.
    pub async fn seed(&self, bytes: &[u8]) -> String {
        let cid = compute_cid_v0(bytes);
        self.blobs.write().await.insert(cid.clone(), bytes.to_vec());
        cid
    }

    /// Fail every call as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `cat` streams never yield.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// `version` calls.
    pub fn version_calls(&self) -> usize {
        self.counters.versions.load(Ordering::SeqCst)
    }

    /// `add` calls.
    pub fn add_calls(&self) -> usize {
        self.counters.adds.load(Ordering::SeqCst)
    }

    /// `cat` calls.
    pub fn cat_calls(&self) -> usize {
        self.counters.cats.load(Ordering::SeqCst)
    }

    /// All calls.
    pub fn total_calls(&self) -> usize {
        self.version_calls() + self.add_calls() + self.cat_calls()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(MultaError::store_unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentNodeEffects for MemoryContentNode {
    async fn version(&self) -> Result<String> {
        self.counters.versions.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        Ok("memory-node/0.1.0".to_string())
    }

    async fn add(&self, bytes: Vec<u8>, name: &str) -> Result<String> {
        self.counters.adds.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        if self.read_only {
            return Err(MultaError::store_unavailable("node is read-only"));
        }
        let cid = compute_cid_v0(&bytes);
        tracing::debug!(cid = %cid, name, size = bytes.len(), "memory node stored blob");
        self.blobs.write().await.insert(cid.clone(), bytes);
        Ok(cid)
    }

    async fn cat(&self, cid: &EvidenceCid) -> Result<ChunkStream> {
        self.counters.cats.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        if self.hang.load(Ordering::SeqCst) {
            return Ok(stream::pending().boxed());
        }
        let Some(bytes) = self.blobs.read().await.get(cid.as_str()).cloned() else {
            return Ok(stream::empty().boxed());
        };
        let chunks: Vec<Result<Vec<u8>>> = bytes
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}
