//! Connectivity report.

use super::to_json;
use multa_core::Result;
use multa_ledger::FinesService;
use serde_json::Value;

/// Probe every collaborator.
pub async fn health(service: &FinesService) -> Result<Value> {
    to_json(&service.health().await)
}
