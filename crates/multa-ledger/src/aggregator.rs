//! Recent-activity feed across every fine.
//!
//! Each call reads every fine and every status log: O(fines x history) with
//! no caching, and at most [`HISTORY_FETCH_CONCURRENCY`] logs in flight.
//! Reads go through [`FineDirectory`] so a cache can be slotted in behind it.

use crate::directory::FineDirectory;
use futures::{stream, StreamExt, TryStreamExt};
use multa_core::history::registration_reason;
use multa_core::{
    format_ledger_timestamp, Fine, FineState, HistoryEvent, Result, StatusUpdate,
    RECENT_HISTORY_LIMIT,
};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

/// Status logs fetched at once while building the feed.
pub const HISTORY_FETCH_CONCURRENCY: usize = 4;

/// Event plus its position in the fine's log; the registration is position 0.
type Positioned = (usize, HistoryEvent);

/// Builds the recent-activity feed.
#[derive(Clone)]
pub struct HistoryAggregator {
    directory: Arc<dyn FineDirectory>,
}

impl HistoryAggregator {
    /// Aggregator reading through `directory`.
    pub fn new(directory: Arc<dyn FineDirectory>) -> Self {
        Self { directory }
    }

    /// The newest events across all fines, at most `RECENT_HISTORY_LIMIT`.
    #[tracing::instrument(skip(self))]
    pub async fn recent_history(&self) -> Result<Vec<HistoryEvent>> {
        let total = self.directory.fine_count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let fines = self.directory.fines_page(1, total).await?;
        let histories: Vec<Vec<StatusUpdate>> = stream::iter(&fines)
            .map(|fine| self.directory.full_history(fine.id))
            .buffered(HISTORY_FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        let events: Vec<Positioned> = fines
            .iter()
            .zip(&histories)
            .flat_map(|(fine, history)| fine_events(fine, history))
            .collect();
        debug!(fines = fines.len(), events = events.len(), "Aggregated status history");

        Ok(newest_first(events, RECENT_HISTORY_LIMIT))
    }
}

/// The synthesized registration event followed by one event per log entry.
fn fine_events<'a>(
    fine: &'a Fine,
    history: &'a [StatusUpdate],
) -> impl Iterator<Item = Positioned> + 'a {
    let event = move |status: FineState, reason: String, timestamp: u64| HistoryEvent {
        fine_id: fine.id,
        plate_number: fine.plate_number.clone(),
        status,
        reason,
        timestamp,
        occurred_at: format_ledger_timestamp(timestamp),
    };

    let registered = (
        0,
        event(
            FineState::INITIAL,
            registration_reason(&fine.infraction_type, &fine.location),
            fine.registered_at,
        ),
    );
    let updates = history.iter().enumerate().map(move |(i, update)| {
        (
            i + 1,
            event(update.new_state, update.reason.clone(), update.timestamp),
        )
    });
    std::iter::once(registered).chain(updates)
}

/// Sort by time descending, ties by fine id then log position, both
/// descending, and keep the first `limit`.
fn newest_first(mut events: Vec<Positioned>, limit: usize) -> Vec<HistoryEvent> {
    events.sort_by_key(|(position, e)| Reverse((e.timestamp, e.fine_id, *position)));
    events.truncate(limit);
    events.into_iter().map(|(_, e)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use multa_core::{FineId, LedgerAddress};
    use proptest::prelude::*;

    fn fine(id: u64, registered_at: u64) -> Fine {
        Fine {
            id: FineId::new(id).unwrap(),
            plate_number: format!("ABC{id:03}"),
            evidence_cid: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into(),
            location: "Calle 26".into(),
            infraction_type: "SEMAFORO_ROJO".into(),
            cost: 100,
            owner_identifier: "CC1".into(),
            current_state: FineState::Pending,
            registered_by: LedgerAddress::ZERO,
            registered_at,
            external_system_id: None,
        }
    }

    fn paid(id: u64, timestamp: u64) -> StatusUpdate {
        StatusUpdate {
            fine_id: FineId::new(id).unwrap(),
            old_state: FineState::Pending,
            new_state: FineState::Paid,
            reason: "paid at bank".into(),
            updated_by: LedgerAddress::ZERO,
            timestamp,
        }
    }

    #[test]
    fn registration_event_is_synthesized() {
        let f = fine(4, 1_700_000_000);
        let events: Vec<_> = fine_events(&f, &[]).collect();
        assert_eq!(events.len(), 1);
        let (position, event) = &events[0];
        assert_eq!(*position, 0);
        assert_eq!(event.status, FineState::Pending);
        assert_eq!(event.reason, "Fine registered for SEMAFORO_ROJO at Calle 26");
        assert_eq!(event.occurred_at, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn same_block_events_order_by_fine_then_position() {
        let a = fine(1, 100);
        let b = fine(2, 100);
        let history_a = [paid(1, 100)];
        let events: Vec<_> = fine_events(&a, &history_a)
            .chain(fine_events(&b, &[]))
            .collect();

        let ordered = newest_first(events, 10);
        let keys: Vec<_> = ordered.iter().map(|e| (e.fine_id.value(), e.status)).collect();
        assert_eq!(
            keys,
            vec![
                (2, FineState::Pending),
                (1, FineState::Paid),
                (1, FineState::Pending),
            ]
        );
    }

    proptest! {
        #[test]
        fn feed_is_bounded_and_newest_first(
            stamps in proptest::collection::vec((1u64..5, 0u64..50, 0usize..4), 0..40),
        ) {
            let events: Vec<Positioned> = stamps
                .iter()
                .map(|(id, ts, position)| {
                    let f = fine(*id, *ts);
                    let (_, event) = fine_events(&f, &[]).next().unwrap();
                    (*position, event)
                })
                .collect();
            let feed = newest_first(events, RECENT_HISTORY_LIMIT);
            prop_assert!(feed.len() <= RECENT_HISTORY_LIMIT);
            prop_assert_eq!(feed.len(), stamps.len().min(RECENT_HISTORY_LIMIT));
            for pair in feed.windows(2) {
                prop_assert!(pair[0].timestamp >= pair[1].timestamp);
            }
        }
    }
}
