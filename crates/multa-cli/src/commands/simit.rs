//! SIMIT lookups and cross-references.

use super::to_json;
use multa_core::{FineState, Result};
use multa_ledger::FinesService;
use serde_json::{json, Value};

/// Fines SIMIT holds for a plate.
pub async fn lookup(service: &FinesService, plate_number: &str) -> Result<Value> {
    to_json(&service.external_fines_by_plate(plate_number).await?)
}

/// Move a fine to a new status with a SIMIT identifier as the reason.
pub async fn link(
    service: &FinesService,
    fine_id: u64,
    new_state: FineState,
    simit_id: &str,
) -> Result<Value> {
    let tx = service.link_to_simit(fine_id, new_state, simit_id).await?;
    Ok(json!({
        "fineId": fine_id,
        "newState": new_state,
        "simitId": simit_id,
        "transactionHash": tx.to_string(),
    }))
}
