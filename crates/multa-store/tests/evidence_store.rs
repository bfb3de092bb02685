//! Evidence Store Tests
//!
//! Upload/retrieval through the primary node, fallback behaviour, the
//! retrieval bound, and the lazily established primary connection.

#![allow(clippy::unwrap_used, missing_docs)]

use assert_matches::assert_matches;
use async_trait::async_trait;
use multa_core::{ChunkStream, ContentNodeEffects, EvidenceCid, MultaError, Result};
use multa_store::{ConnectionState, EvidenceStore};
use multa_testkit::{evidence_bytes, MemoryContentNode};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn store_pair() -> (EvidenceStore, MemoryContentNode, MemoryContentNode) {
    let primary = MemoryContentNode::new().with_chunk_size(7);
    let fallback = primary.peer().read_only();
    let store = EvidenceStore::new(Arc::new(primary.clone()), Arc::new(fallback.clone()));
    (store, primary, fallback)
}

const UNKNOWN_CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

// ============================================================================
// Upload and round trip
// ============================================================================

#[tokio::test]
async fn upload_then_get_reassembles_original_bytes() {
    let (store, primary, fallback) = store_pair();
    let bytes = evidence_bytes("speed-camera-0042");

    let cid = store.upload(bytes.clone(), "photo.jpg").await.unwrap();
    let blob = store.get(&cid).await.unwrap();

    assert!(blob.chunks.len() > 1);
    assert_eq!(blob.total_size, bytes.len() as u64);
    assert_eq!(blob.into_bytes(), bytes);
    assert_eq!(fallback.total_calls(), 0);
    assert_eq!(primary.add_calls(), 1);
}

#[tokio::test]
async fn upload_fails_when_primary_is_down() {
    let (store, primary, fallback) = store_pair();
    primary.set_offline(true);

    let err = store.upload(b"x".to_vec(), "x.jpg").await.unwrap_err();
    assert_matches!(err, MultaError::StoreUnavailable { .. });
    // writes never go to the fallback path
    assert_eq!(fallback.add_calls(), 0);
}

struct MisbehavingNode;

#[async_trait]
impl ContentNodeEffects for MisbehavingNode {
    async fn version(&self) -> Result<String> {
        Ok("misbehaving".into())
    }

    async fn add(&self, _bytes: Vec<u8>, _name: &str) -> Result<String> {
        Ok("not-a-cid".into())
    }

    async fn cat(&self, _cid: &EvidenceCid) -> Result<ChunkStream> {
        Err(MultaError::store_unavailable("unsupported"))
    }
}

#[tokio::test]
async fn malformed_identifier_from_node_is_rejected() {
    let store = EvidenceStore::new(Arc::new(MisbehavingNode), Arc::new(MisbehavingNode));
    let err = store.upload(b"x".to_vec(), "x.jpg").await.unwrap_err();
    assert_matches!(err, MultaError::StoreUnavailable { ref message } if message.contains("not-a-cid"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn identical_bytes_yield_identical_cid_and_round_trip(
        bytes in proptest::collection::vec(any::<u8>(), 1..2048),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            let (store, _, _) = store_pair();
            let first = store.upload(bytes.clone(), "a.jpg").await.unwrap();
            let second = store.upload(bytes.clone(), "b.jpg").await.unwrap();
            prop_assert_eq!(&first, &second);

            let blob = store.get(&first).await.unwrap();
            prop_assert_eq!(blob.into_bytes(), bytes.clone());
            Ok(())
        })?;
    }
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn invalid_cid_is_rejected_before_any_network_call() {
    let (store, primary, fallback) = store_pair();

    let err = store.get_str("not-a-cid").await.unwrap_err();

    assert_matches!(err, MultaError::Validation { .. });
    assert_eq!(primary.total_calls(), 0);
    assert_eq!(fallback.total_calls(), 0);
    assert_eq!(store.connection_state().await, ConnectionState::Uninitialized);
}

// ============================================================================
// Fallback path
// ============================================================================

#[tokio::test]
async fn fallback_serves_when_primary_is_unreachable() {
    let (store, primary, fallback) = store_pair();
    let cid = primary.seed(b"plate photo").await;
    primary.set_offline(true);

    let blob = store.get_str(&cid).await.unwrap();

    assert_eq!(blob.into_bytes(), b"plate photo");
    assert_eq!(fallback.cat_calls(), 1);
    assert_matches!(store.connection_state().await, ConnectionState::Failed { .. });
}

#[tokio::test]
async fn fallback_is_tried_when_primary_has_nothing() {
    let primary = MemoryContentNode::new();
    let fallback = MemoryContentNode::new().read_only();
    let cid = fallback.seed(b"only on the gateway").await;
    let store = EvidenceStore::new(Arc::new(primary.clone()), Arc::new(fallback.clone()));

    let blob = store.get_str(&cid).await.unwrap();

    assert_eq!(blob.into_bytes(), b"only on the gateway");
    assert_eq!(primary.cat_calls(), 1);
    assert_eq!(fallback.cat_calls(), 1);
}

#[tokio::test]
async fn unknown_cid_is_not_found() {
    let (store, primary, fallback) = store_pair();

    let err = store.get_str(UNKNOWN_CID).await.unwrap_err();

    assert_matches!(err, MultaError::NotFound { .. });
    assert_eq!(primary.cat_calls(), 1);
    assert_eq!(fallback.cat_calls(), 1);
}

#[tokio::test]
async fn both_paths_down_is_store_unavailable() {
    let (store, primary, fallback) = store_pair();
    primary.set_offline(true);
    fallback.set_offline(true);

    let err = store.get_str(UNKNOWN_CID).await.unwrap_err();
    assert_matches!(err, MultaError::StoreUnavailable { .. });
}

// ============================================================================
// Retrieval bound
// ============================================================================

#[tokio::test(start_paused = true)]
async fn hanging_primary_times_out_within_bound() {
    let (store, primary, fallback) = store_pair();
    let cid = primary.seed(b"never delivered").await;
    primary.set_hang(true);

    let started = tokio::time::Instant::now();
    let err = store.get_str(&cid).await.unwrap_err();

    assert_matches!(err, MultaError::RetrievalTimeout { timeout_ms: 30_000, .. });
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(31));
    // the bound spans both attempts; a hung primary leaves no time for the fallback
    assert_eq!(fallback.cat_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_fallback_times_out_too() {
    let (store, primary, fallback) = store_pair();
    primary.set_offline(true);
    fallback.set_hang(true);
    let store = store.with_retrieval_timeout(Duration::from_secs(5));

    let err = store.get_str(UNKNOWN_CID).await.unwrap_err();
    assert_matches!(err, MultaError::RetrievalTimeout { timeout_ms: 5_000, .. });
}

// ============================================================================
// Connection state
// ============================================================================

#[tokio::test]
async fn connection_is_established_lazily_and_reused() {
    let (store, primary, _) = store_pair();
    assert_eq!(store.connection_state().await, ConnectionState::Uninitialized);

    let cid = store.upload(b"a".to_vec(), "a.jpg").await.unwrap();
    assert!(store.connection_state().await.is_connected());
    store.get(&cid).await.unwrap();

    assert_eq!(primary.version_calls(), 1);
}

#[tokio::test]
async fn is_connected_reprobes_every_call() {
    let (store, primary, _) = store_pair();

    assert!(store.is_connected().await);
    primary.set_offline(true);
    assert!(!store.is_connected().await);
    assert_matches!(store.connection_state().await, ConnectionState::Failed { .. });
    primary.set_offline(false);
    assert!(store.is_connected().await);

    assert_eq!(primary.version_calls(), 3);
}
