//! Status logs, recent activity and integrity reports.

use super::to_json;
use multa_core::Result;
use multa_ledger::FinesService;
use serde_json::Value;

/// One page of a fine's status log.
pub async fn history(
    service: &FinesService,
    fine_id: u64,
    page: u64,
    page_size: u64,
) -> Result<Value> {
    to_json(&service.status_history(fine_id, page, page_size).await?)
}

/// Newest events across all fines.
pub async fn recent(service: &FinesService) -> Result<Value> {
    to_json(&service.recent_history().await?)
}

/// Integrity report. Never fails; violations are part of the report.
pub async fn integrity(service: &FinesService, fine_id: u64) -> Result<Value> {
    to_json(&service.integrity(fine_id).await)
}
