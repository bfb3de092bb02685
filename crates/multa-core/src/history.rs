//! Cross-fine activity feed entries.

use crate::fine::FineId;
use crate::state::FineState;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Maximum number of events in the recent-activity feed.
pub const RECENT_HISTORY_LIMIT: usize = 10;

/// One entry of the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Fine the event concerns
    pub fine_id: FineId,
    /// Plate of that fine
    pub plate_number: String,
    /// Status the fine entered
    pub status: FineState,
    /// Reason recorded with the event
    pub reason: String,
    /// Ledger time, unix seconds
    pub timestamp: u64,
    /// Calendar rendering of `timestamp`
    pub occurred_at: String,
}

/// Render ledger seconds as an RFC 3339 UTC date-time with millisecond precision.
pub fn format_ledger_timestamp(seconds: u64) -> String {
    let millis = i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| seconds.to_string())
}

/// Reason attached to the synthesized registration event.
pub fn registration_reason(infraction_type: &str, location: &str) -> String {
    format!("Fine registered for {infraction_type} at {location}")
}
