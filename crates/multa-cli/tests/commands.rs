//! Command Handler Tests
//!
//! Handlers run against in-memory handlers; output is the JSON the binary
//! prints.

#![allow(clippy::unwrap_used, missing_docs)]

use assert_matches::assert_matches;
use multa_cli::commands;
use multa_core::{Environment, FineState, MultaError};
use multa_ledger::{FinesService, LedgerGateway};
use multa_store::EvidenceStore;
use multa_testkit::{evidence_bytes, speeding_fine_fields, MemoryContentNode, MemoryLedger};
use std::sync::Arc;

fn service() -> FinesService {
    let node = MemoryContentNode::new();
    let store = EvidenceStore::new(Arc::new(node.clone()), Arc::new(node.peer().read_only()));
    FinesService::new(LedgerGateway::from_handler(MemoryLedger::new()), store)
}

#[tokio::test]
async fn register_show_and_fetch_evidence() {
    let service = service();
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.jpg");
    std::fs::write(&photo, evidence_bytes("camera-7")).unwrap();

    let registered = commands::fines::register(&service, &photo, speeding_fine_fields())
        .await
        .unwrap();
    assert_eq!(registered["fineId"], 1);
    assert_eq!(registered["fineIdSource"], "found");
    let cid = registered["evidenceCID"].as_str().unwrap().to_string();

    let shown = commands::fines::show(&service, 1, 0).await.unwrap();
    assert_eq!(shown["fine"]["plateNumber"], "ABC123");
    assert_eq!(shown["fine"]["currentState"], 0);
    assert_eq!(shown["status"], "Pending payment");
    assert_eq!(shown["amountDue"]["overdue"], false);

    let out = dir.path().join("copy.jpg");
    let fetched = commands::evidence::fetch(&service, &cid, &out).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), evidence_bytes("camera-7"));
    assert_eq!(fetched["size"], evidence_bytes("camera-7").len());
}

#[tokio::test]
async fn status_update_reports_the_transaction() {
    let service = service();
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.jpg");
    std::fs::write(&photo, evidence_bytes("x")).unwrap();
    commands::fines::register(&service, &photo, speeding_fine_fields())
        .await
        .unwrap();

    let updated = commands::fines::update_status(&service, 1, FineState::Paid, "paid")
        .await
        .unwrap();

    assert_eq!(updated["newState"], 1);
    assert_eq!(updated["description"], "Paid");
    assert!(updated["transactionHash"].as_str().unwrap().starts_with("0x"));
    let history = commands::history::history(&service, 1, 1, 10).await.unwrap();
    assert_eq!(history["total"], 1);
}

#[tokio::test]
async fn simit_link_moves_the_fine_and_refuses_a_repeat() {
    let service = service();
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.jpg");
    std::fs::write(&photo, evidence_bytes("x")).unwrap();
    commands::fines::register(&service, &photo, speeding_fine_fields())
        .await
        .unwrap();

    let linked = commands::simit::link(&service, 1, FineState::Paid, "SIMIT-7")
        .await
        .unwrap();
    assert_eq!(linked["newState"], 1);
    assert_eq!(linked["simitId"], "SIMIT-7");

    let err = commands::simit::link(&service, 1, FineState::Paid, "SIMIT-7")
        .await
        .unwrap_err();
    assert_matches!(err, MultaError::Validation { .. });

    let history = commands::history::history(&service, 1, 1, 10).await.unwrap();
    assert_eq!(history["total"], 1);
    assert_eq!(history["updates"][0]["reason"], "Linked to SIMIT: SIMIT-7");
    assert_eq!(history["updates"][0]["newState"], 1);
}

#[tokio::test]
async fn errors_render_as_normalised_documents() {
    let service = service();

    let err = commands::fines::show(&service, 99, 0).await.unwrap_err();
    assert_matches!(err, MultaError::NotFound { .. });

    let rendered: serde_json::Value =
        serde_json::from_str(&commands::render_error(&err, Environment::Production)).unwrap();
    assert_eq!(rendered["status"], 404);
    assert!(rendered.get("detail").is_none());
    assert_eq!(commands::exit_code(&err), 2);
    assert_eq!(commands::exit_code(&MultaError::ledger_read("node down")), 1);

    let rendered: serde_json::Value =
        serde_json::from_str(&commands::render_error(&err, Environment::Development)).unwrap();
    assert!(rendered["detail"].is_string());
}

#[tokio::test]
async fn integrity_always_produces_a_report() {
    let service = service();
    let report = commands::history::integrity(&service, 5).await.unwrap();
    assert_eq!(report["isValid"], false);
}
