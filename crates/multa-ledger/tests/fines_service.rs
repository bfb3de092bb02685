//! Fines Service Tests
//!
//! End-to-end flows through the facade: registration with evidence upload,
//! guarded status transitions, plate lookups, the activity feed, health and
//! the SIMIT lookup.

#![allow(clippy::unwrap_used, missing_docs)]

use assert_matches::assert_matches;
use async_trait::async_trait;
use multa_core::{
    Fine, FineId, FineIdSource, FineState, MultaError, RegistrationDetails, Result, SimitEffects,
    SimitFine, SimitFineStatus, StatusUpdate, PAYMENT_WINDOW_SECS,
};
use multa_ledger::{
    FineDirectory, FinesService, HistoryAggregator, HistorySource, LedgerGateway,
    StatusHistoryPage, HISTORY_FETCH_CONCURRENCY,
};
use multa_store::EvidenceStore;
use multa_testkit::{
    evidence_bytes, new_fine, speeding_fine_fields, MemoryContentNode, MemoryLedger,
    BLOCK_TIME_SECS, GENESIS_TIME, SAMPLE_PLATE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

struct Harness {
    service: FinesService,
    ledger: MemoryLedger,
    node: MemoryContentNode,
}

fn harness() -> Harness {
    let ledger = MemoryLedger::new();
    let node = MemoryContentNode::new();
    let store = EvidenceStore::new(Arc::new(node.clone()), Arc::new(node.peer().read_only()));
    let service = FinesService::new(LedgerGateway::from_handler(ledger.clone()), store);
    Harness {
        service,
        ledger,
        node,
    }
}

struct StaticSimit(Vec<SimitFine>);

#[async_trait]
impl SimitEffects for StaticSimit {
    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<SimitFine>> {
        Ok(self
            .0
            .iter()
            .filter(|f| f.plate_number == plate_number)
            .cloned()
            .collect())
    }

    async fn check_connection(&self) -> bool {
        true
    }
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn registering_a_speeding_fine() {
    let h = harness();
    let evidence = evidence_bytes("speed-camera-0042");

    let registered = h
        .service
        .register_fine(evidence.clone(), "photo.jpg", speeding_fine_fields())
        .await
        .unwrap();

    assert_eq!(registered.fine_id_source, FineIdSource::Found);
    assert!(registered.fine_id.value() > 0);
    let cid = registered.evidence_cid.as_str();
    assert!(cid.starts_with("Qm"));
    assert_eq!(cid.len(), 46);
    assert!(cid.chars().all(|c| c.is_ascii_alphanumeric()));
    let hash = registered.transaction_hash.to_string();
    assert_eq!(hash.len(), 66);
    assert!(hash[2..].chars().all(|c| c.is_ascii_hexdigit()));

    let fine = h.service.fine(registered.fine_id.value()).await.unwrap();
    assert_eq!(fine.plate_number, SAMPLE_PLATE);
    assert_eq!(fine.evidence_cid, cid);
    assert_eq!(fine.cost, 500_000);
    assert_eq!(fine.infraction_type, "EXCESO_VELOCIDAD");

    let blob = h.service.evidence(cid).await.unwrap();
    assert_eq!(blob.into_bytes(), evidence);
}

#[tokio::test]
async fn registration_outcome_carries_a_numeric_fine_id() {
    let h = harness();
    h.ledger.suppress_events(true);

    let registered = h
        .service
        .register_fine(evidence_bytes("a"), "a.jpg", speeding_fine_fields())
        .await
        .unwrap();

    let rendered = serde_json::to_value(&registered).unwrap();
    assert_eq!(rendered["fineId"], 1);
    assert_eq!(rendered["fineIdSource"], "derived_from_count");
    assert!(rendered["evidenceCID"].as_str().unwrap().starts_with("Qm"));
    assert!(rendered["transactionHash"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn invalid_fields_are_rejected_before_upload() {
    let h = harness();
    let mut fields = speeding_fine_fields();
    fields.plate_number = "AB-1234".into();

    let err = h
        .service
        .register_fine(evidence_bytes("x"), "photo.jpg", fields)
        .await
        .unwrap_err();

    assert_matches!(err, MultaError::Validation { .. });
    assert_eq!(h.node.total_calls(), 0);
    assert_eq!(h.ledger.network_calls(), 0);
}

#[tokio::test]
async fn empty_evidence_is_rejected() {
    let h = harness();
    let err = h
        .service
        .register_fine(Vec::new(), "photo.jpg", speeding_fine_fields())
        .await
        .unwrap_err();
    assert_matches!(err, MultaError::Validation { .. });
    assert_eq!(h.node.add_calls(), 0);
}

// ============================================================================
// Status transitions
// ============================================================================

#[tokio::test]
async fn paying_a_fine_appends_to_its_history() {
    let h = harness();
    let registered = h
        .service
        .register_fine(evidence_bytes("a"), "a.jpg", speeding_fine_fields())
        .await
        .unwrap();
    let id = registered.fine_id.value();
    let before = h.service.status_history(id, 1, 10).await.unwrap();

    let tx = h
        .service
        .update_fine_status(id, FineState::Paid, "Paid at Banco de Bogotá")
        .await
        .unwrap();

    assert_ne!(tx, registered.transaction_hash);
    let after = h.service.status_history(id, 1, 10).await.unwrap();
    assert_eq!(after.total, before.total + 1);
    assert_eq!(after.source, HistorySource::Typed);
    let entry = after.updates.last().unwrap();
    assert_eq!(entry.new_state, FineState::Paid);
    assert_eq!(entry.reason, "Paid at Banco de Bogotá");
}

#[tokio::test]
async fn cancelled_fines_cannot_be_paid() {
    let h = harness();
    let id = h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;
    h.ledger.seed_status(id, FineState::Cancelled, "voided").await;

    let err = h
        .service
        .update_fine_status(id.value(), FineState::Paid, "late payment")
        .await
        .unwrap_err();

    assert_matches!(err, MultaError::Validation { ref message } if message.contains("CANCELLED to PAID"));
    assert_eq!(h.ledger.submissions(), 0);
}

#[tokio::test]
async fn blank_reason_is_rejected_without_ledger_access() {
    let h = harness();
    h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;

    let err = h
        .service
        .update_fine_status(1, FineState::Paid, "   ")
        .await
        .unwrap_err();

    assert_matches!(err, MultaError::Validation { .. });
    assert_eq!(h.ledger.network_calls(), 0);
}

#[tokio::test]
async fn updating_unknown_fine_is_not_found() {
    let h = harness();
    let err = h
        .service
        .update_fine_status(7, FineState::Paid, "paid")
        .await
        .unwrap_err();
    assert_matches!(err, MultaError::NotFound { .. });
    assert_eq!(h.ledger.submissions(), 0);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn malformed_cid_makes_no_network_calls() {
    let h = harness();

    let err = h.service.evidence("not-a-cid").await.unwrap_err();

    assert_matches!(err, MultaError::Validation { .. });
    assert_eq!(h.node.total_calls(), 0);
    assert_eq!(h.ledger.network_calls(), 0);
}

#[tokio::test]
async fn plate_lookup_resolves_every_fine() {
    let h = harness();
    h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;
    h.ledger.seed_fine(new_fine("XYZ789", CID)).await;
    h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;

    let fines = h.service.fines_by_plate(" abc123 ").await.unwrap();

    let ids: Vec<_> = fines.iter().map(|f| f.id.value()).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_matches!(
        h.service.fines_by_plate("12ABC").await,
        Err(MultaError::Validation { .. })
    );
}

#[tokio::test]
async fn history_of_unknown_fine_is_not_found() {
    let h = harness();
    assert_matches!(
        h.service.status_history(1, 1, 10).await,
        Err(MultaError::NotFound { .. })
    );
}

#[tokio::test]
async fn overdue_fines_carry_the_late_fee() {
    let h = harness();
    let id = h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;
    let registered_at = GENESIS_TIME + BLOCK_TIME_SECS;

    let on_time = h.service.amount_due(id.value(), registered_at + 60).await.unwrap();
    assert!(!on_time.overdue);
    assert_eq!(on_time.amount_due, 500_000);

    let late = h
        .service
        .amount_due(id.value(), registered_at + PAYMENT_WINDOW_SECS + 1)
        .await
        .unwrap();
    assert!(late.overdue);
    assert_eq!(late.amount_due, 550_000);
}

// ============================================================================
// Recent activity
// ============================================================================

#[tokio::test]
async fn empty_ledger_has_no_activity() {
    let h = harness();
    assert!(h.service.recent_history().await.unwrap().is_empty());
}

#[tokio::test]
async fn recent_activity_is_bounded_and_newest_first() {
    let h = harness();
    for plate in ["AAA111", "BBB222", "CCC333", "DDD444", "EEE555", "FFF666"] {
        let id = h.ledger.seed_fine(new_fine(plate, CID)).await;
        h.ledger.seed_status(id, FineState::Paid, "paid").await;
    }

    let feed = h.service.recent_history().await.unwrap();

    assert_eq!(feed.len(), 10);
    assert!(feed.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    let newest = &feed[0];
    assert_eq!(newest.plate_number, "FFF666");
    assert_eq!(newest.status, FineState::Paid);
    let registration = &feed[1];
    assert_eq!(registration.status, FineState::Pending);
    assert_eq!(
        registration.reason,
        "Fine registered for EXCESO_VELOCIDAD at Calle 26 # 68-35, Bogotá"
    );
    assert!(registration.occurred_at.ends_with(".000Z"));

    let rendered = serde_json::to_value(registration).unwrap();
    assert_eq!(rendered["status"], 0);
    assert_eq!(serde_json::to_value(newest).unwrap()["status"], 1);
}

/// Gateway-backed directory that records how many status logs are being
/// fetched at the same time.
struct TrackingDirectory {
    inner: LedgerGateway,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl FineDirectory for TrackingDirectory {
    async fn fine_count(&self) -> Result<u64> {
        self.inner.fine_count().await
    }

    async fn fine(&self, fine_id: u64) -> Result<Fine> {
        self.inner.fine(fine_id).await
    }

    async fn fines_page(&self, page: u64, page_size: u64) -> Result<Vec<Fine>> {
        self.inner.fines_page(page, page_size).await
    }

    async fn plate_fine_ids(&self, plate_number: &str) -> Result<Vec<u64>> {
        self.inner.plate_fine_ids(plate_number).await
    }

    async fn registration(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        self.inner.registration(fine_id).await
    }

    async fn history_page(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage> {
        self.inner.history_page(fine_id, page, page_size).await
    }

    async fn full_history(&self, fine_id: FineId) -> Result<Vec<StatusUpdate>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let history = self.inner.full_history(fine_id).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        history
    }
}

#[tokio::test]
async fn activity_feed_limits_concurrent_log_fetches() {
    let ledger = MemoryLedger::new();
    for i in 0..12 {
        ledger.seed_fine(new_fine(&format!("AAA{i:03}"), CID)).await;
    }
    let directory = Arc::new(TrackingDirectory {
        inner: LedgerGateway::from_handler(ledger.clone()),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });

    let feed = HistoryAggregator::new(directory.clone())
        .recent_history()
        .await
        .unwrap();

    assert_eq!(feed.len(), 10);
    let peak = directory.peak.load(Ordering::SeqCst);
    assert!(peak <= HISTORY_FETCH_CONCURRENCY, "{peak} logs fetched at once");
    assert!(peak > 1);
}

// ============================================================================
// Health and SIMIT
// ============================================================================

#[tokio::test]
async fn health_reports_each_collaborator() {
    let h = harness();
    let report = h.service.health().await;
    assert!(report.healthy);
    assert!(report.contract_deployed);
    assert!(report.evidence_connected);
    assert!(report.simit_reachable.is_none());

    h.ledger.set_offline(true);
    h.node.set_offline(true);
    let report = h.service.health().await;
    assert!(!report.healthy);
    assert!(!report.contract_deployed);
    assert!(report.ledger_error.is_some());
    assert!(!report.evidence_connected);
}

#[tokio::test]
async fn simit_lookup_requires_configuration() {
    let h = harness();
    assert_matches!(
        h.service.external_fines_by_plate(SAMPLE_PLATE).await,
        Err(MultaError::Configuration { .. })
    );

    let simit = StaticSimit(vec![SimitFine {
        simit_id: "SIMIT-2024-0001".into(),
        plate_number: SAMPLE_PLATE.into(),
        infraction_type: "EXCESO_VELOCIDAD".into(),
        infraction_date: "2024-03-01".into(),
        location: "Calle 26".into(),
        cost: 500_000,
        status: SimitFineStatus::Pending,
        payment_deadline: "2024-03-31".into(),
    }]);
    let service = h.service.clone().with_simit(Arc::new(simit));

    let fines = service.external_fines_by_plate("abc123").await.unwrap();
    assert_eq!(fines.len(), 1);
    assert_eq!(service.health().await.simit_reachable, Some(true));
}

#[tokio::test]
async fn linking_to_simit_records_the_reference() {
    let h = harness();
    let id = h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;

    h.service
        .link_to_simit(id.value(), FineState::Paid, "SIMIT-2024-0001")
        .await
        .unwrap();

    let page = h.service.status_history(id.value(), 1, 10).await.unwrap();
    assert_eq!(page.updates[0].reason, "Linked to SIMIT: SIMIT-2024-0001");
    assert_eq!(h.service.fine(id.value()).await.unwrap().current_state, FineState::Paid);
}

#[tokio::test]
async fn linking_to_simit_needs_a_legal_status_change() {
    let h = harness();
    let id = h.ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;

    for state in [FineState::Pending, FineState::ResolvedAppeal] {
        let err = h
            .service
            .link_to_simit(id.value(), state, "SIMIT-2024-0001")
            .await
            .unwrap_err();
        assert_matches!(err, MultaError::Validation { .. });
    }
    assert_eq!(h.ledger.submissions(), 0);

    let err = h
        .service
        .link_to_simit(42, FineState::Paid, "SIMIT-2024-0001")
        .await
        .unwrap_err();
    assert_matches!(err, MultaError::NotFound { .. });
}
