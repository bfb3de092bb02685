//! Integrity Verification Tests
//!
//! Reports for untouched fines, fines with a consistent log, and fines whose
//! ledger data was tampered with. Every case returns a report; none fails.

#![allow(clippy::unwrap_used, missing_docs)]

use multa_core::{FineId, FineState, LedgerAddress, StatusUpdate, ALL_CHECKS_PASSED};
use multa_ledger::{LedgerGateway, INTEGRITY_PAGE_SIZE};
use multa_testkit::{new_fine, MemoryLedger, BLOCK_TIME_SECS, GENESIS_TIME, SAMPLE_PLATE};

const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

async fn registered() -> (LedgerGateway, MemoryLedger, FineId) {
    let ledger = MemoryLedger::new();
    let id = ledger.seed_fine(new_fine(SAMPLE_PLATE, CID)).await;
    (LedgerGateway::from_handler(ledger.clone()), ledger, id)
}

// ============================================================================
// Valid reports
// ============================================================================

#[tokio::test]
async fn fresh_fine_without_history_is_valid() {
    let (gateway, _, id) = registered().await;

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(report.is_valid);
    assert_eq!(report.details, vec![ALL_CHECKS_PASSED.to_string()]);
    assert_eq!(report.fine_id, 1);
    assert_eq!(report.registration_block, 1);
    assert_eq!(report.registration_timestamp, GENESIS_TIME + BLOCK_TIME_SECS);
    assert_eq!(report.status_history_length, 0);
    assert_eq!(report.last_status_update, 0);
}

#[tokio::test]
async fn consistent_transitions_are_valid() {
    let (gateway, ledger, id) = registered().await;
    ledger.seed_status(id, FineState::Appealed, "disputed").await;
    ledger.seed_status(id, FineState::ResolvedAppeal, "upheld").await;
    ledger.seed_status(id, FineState::Paid, "paid").await;

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(report.is_valid, "{:?}", report.details);
    assert_eq!(report.status_history_length, 3);
    assert_eq!(report.last_status_update, GENESIS_TIME + 4 * BLOCK_TIME_SECS);
}

#[tokio::test]
async fn newest_entry_beyond_first_page_is_checked() {
    let (gateway, ledger, id) = registered().await;
    ledger.seed_status(id, FineState::Appealed, "disputed").await;
    for i in 0..INTEGRITY_PAGE_SIZE {
        let state = if i % 2 == 0 { FineState::ResolvedAppeal } else { FineState::Appealed };
        ledger.seed_status(id, state, &format!("review {i}")).await;
    }
    assert!(gateway.verify_blockchain_integrity(id.value()).await.is_valid);

    // only the tail entry disagrees with the fine now
    ledger.tamper_status(id.value(), FineState::Cancelled).await;
    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(!report.is_valid);
    assert_eq!(report.status_history_length, INTEGRITY_PAGE_SIZE + 1);
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].starts_with("Status mismatch"));
}

// ============================================================================
// Violations
// ============================================================================

#[tokio::test]
async fn status_without_history_is_a_violation() {
    let (gateway, ledger, id) = registered().await;
    ledger.tamper_status(id.value(), FineState::Paid).await;

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(!report.is_valid);
    assert_eq!(report.violations(), ["Status PAID present without history".to_string()]);
}

#[tokio::test]
async fn status_disagreeing_with_latest_entry_is_a_violation() {
    let (gateway, ledger, id) = registered().await;
    ledger.seed_status(id, FineState::Paid, "paid").await;
    ledger.tamper_status(id.value(), FineState::Appealed).await;

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(!report.is_valid);
    assert!(report.violations()[0].contains("fine is APPEALED"));
    assert!(report.violations()[0].contains("records PAID"));
}

#[tokio::test]
async fn zero_registration_timestamp_is_a_violation() {
    let (gateway, ledger, id) = registered().await;
    ledger.tamper_registration_timestamp(id.value(), 0).await;

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(!report.is_valid);
    assert_eq!(report.registration_timestamp, 0);
    assert_eq!(report.violations(), ["Registration timestamp is zero".to_string()]);
}

#[tokio::test]
async fn broken_chain_is_a_violation() {
    let (gateway, ledger, id) = registered().await;
    ledger.seed_status(id, FineState::Paid, "paid").await;
    ledger
        .inject_history_entry(StatusUpdate {
            fine_id: id,
            old_state: FineState::Appealed,
            new_state: FineState::Paid,
            reason: "rewritten".into(),
            updated_by: LedgerAddress::ZERO,
            timestamp: GENESIS_TIME + 100,
        })
        .await;

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(!report.is_valid);
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].starts_with("History entry 2 starts from APPEALED"));
}

// ============================================================================
// Fetch failures become reports
// ============================================================================

#[tokio::test]
async fn unknown_fine_yields_failed_report() {
    let (gateway, _, _) = registered().await;

    let report = gateway.verify_blockchain_integrity(42).await;

    assert!(!report.is_valid);
    assert_eq!(report.fine_id, 42);
    assert_eq!(report.details.len(), 1);
    assert!(report.details[0].starts_with("Verification failed:"));
    assert!(report.details[0].contains("not found"));
}

#[tokio::test]
async fn unreachable_ledger_yields_failed_report() {
    let (gateway, ledger, id) = registered().await;
    ledger.set_offline(true);

    let report = gateway.verify_blockchain_integrity(id.value()).await;

    assert!(!report.is_valid);
    assert_eq!(report.registration_block, 0);
    assert!(report.details[0].contains("unreachable"));
}
