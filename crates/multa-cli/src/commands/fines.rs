//! Fine registration, status changes and lookups.

use super::to_json;
use multa_core::{FineFields, FineState, Result};
use multa_ledger::FinesService;
use serde_json::{json, Value};
use std::path::Path;

/// Upload the evidence file and register the fine.
pub async fn register(service: &FinesService, evidence: &Path, fields: FineFields) -> Result<Value> {
    let bytes = tokio::fs::read(evidence).await?;
    let name = evidence
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("evidence");
    let registered = service.register_fine(bytes, name, fields).await?;
    to_json(&registered)
}

/// Move a fine to a new status.
pub async fn update_status(
    service: &FinesService,
    fine_id: u64,
    new_state: FineState,
    reason: &str,
) -> Result<Value> {
    let tx = service.update_fine_status(fine_id, new_state, reason).await?;
    Ok(json!({
        "fineId": fine_id,
        "newState": new_state,
        "description": new_state.description(),
        "transactionHash": tx.to_string(),
    }))
}

/// One fine with the amount currently due.
pub async fn show(service: &FinesService, fine_id: u64, now: u64) -> Result<Value> {
    let fine = service.fine(fine_id).await?;
    let due = service.amount_due(fine_id, now).await?;
    Ok(json!({
        "fine": to_json(&fine)?,
        "status": fine.current_state.description(),
        "amountDue": to_json(&due)?,
    }))
}

/// One page of fines.
pub async fn list(service: &FinesService, page: u64, page_size: u64) -> Result<Value> {
    to_json(&service.fines(page, page_size).await?)
}

/// Every fine recorded for a plate.
pub async fn by_plate(service: &FinesService, plate_number: &str) -> Result<Value> {
    to_json(&service.fines_by_plate(plate_number).await?)
}
