//! Command handlers. Each returns the JSON document the binary prints.

/// Evidence retrieval
pub mod evidence;

/// Registration, status changes and fine lookups
pub mod fines;

/// Connectivity report
pub mod health;

/// Status logs, the activity feed and integrity checks
pub mod history;

/// External SIMIT lookups
pub mod simit;

use multa_core::{ErrorResponse, Environment, MultaError, Result};
use serde::Serialize;
use serde_json::Value;

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Pretty-printed output document.
pub fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Normalised error document for a failed command.
pub fn render_error(err: &MultaError, environment: Environment) -> String {
    let response = ErrorResponse::from_error(err, environment);
    serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.message.clone())
}

/// Process exit status for a failed command: 2 when the request itself was
/// wrong (bad input, unknown fine), 1 for ledger, store and other faults.
pub fn exit_code(err: &MultaError) -> u8 {
    if err.is_client_fault() {
        2
    } else {
        1
    }
}
