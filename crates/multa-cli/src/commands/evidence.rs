//! Evidence retrieval.

use multa_core::Result;
use multa_ledger::FinesService;
use serde_json::{json, Value};
use std::path::Path;

/// Fetch a blob by CID and write it to `output`.
pub async fn fetch(service: &FinesService, cid: &str, output: &Path) -> Result<Value> {
    let blob = service.evidence(cid).await?;
    let size = blob.total_size;
    tokio::fs::write(output, blob.into_bytes()).await?;
    tracing::info!(cid, path = %output.display(), size, "Evidence written");
    Ok(json!({
        "cid": cid,
        "path": output.display().to_string(),
        "size": size,
    }))
}
