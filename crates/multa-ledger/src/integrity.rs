//! Integrity verification
//!
//! Cross-checks a fine's recorded metadata against its append-only status
//! log. Violations are data: every outcome, including a failed fetch, is an
//! [`IntegrityReport`].

use crate::directory::FineDirectory;
use multa_core::{
    Fine, FineState, IntegrityReport, IntegrityReportBuilder, RegistrationDetails, Result,
    StatusUpdate,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Status-log entries fetched in the first page.
pub const INTEGRITY_PAGE_SIZE: u64 = 100;

/// Checks one fine at a time.
#[derive(Clone)]
pub struct IntegrityVerifier {
    directory: Arc<dyn FineDirectory>,
}

impl IntegrityVerifier {
    /// Verifier reading through `directory`.
    pub fn new(directory: Arc<dyn FineDirectory>) -> Self {
        Self { directory }
    }

    /// Verify `fine_id`. Fetch failures produce an invalid report with a
    /// single violation describing the failure.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, fine_id: u64) -> IntegrityReport {
        match self.collect(fine_id).await {
            Ok(report) => {
                debug!(is_valid = report.is_valid, "Integrity verification finished");
                report
            }
            Err(err) => {
                error!(error = %err, "Integrity verification could not fetch ledger data");
                IntegrityReport::failed(fine_id, err)
            }
        }
    }

    async fn collect(&self, fine_id: u64) -> Result<IntegrityReport> {
        let fine = self.directory.fine(fine_id).await?;
        let registration = self.directory.registration(fine.id).await?;
        let first = self
            .directory
            .history_page(fine.id, 1, INTEGRITY_PAGE_SIZE)
            .await?;

        let latest = if first.updates.len() as u64 >= first.total {
            first.updates.last().cloned()
        } else {
            // the newest entry is past the first page
            self.directory
                .history_page(fine.id, first.total, 1)
                .await?
                .updates
                .pop()
        };

        Ok(evaluate(&fine, &registration, &first.updates, first.total, latest.as_ref()))
    }
}

/// Apply every check to fetched ledger data.
///
/// `page` is the first page of the log; `latest` is the newest entry overall.
pub fn evaluate(
    fine: &Fine,
    registration: &RegistrationDetails,
    page: &[StatusUpdate],
    total: u64,
    latest: Option<&StatusUpdate>,
) -> IntegrityReport {
    let mut builder = IntegrityReportBuilder::new(fine.id)
        .registration(registration.block_number, registration.timestamp)
        .history(total, latest.map_or(0, |u| u.timestamp));

    if let Some(latest) = latest {
        builder.check(
            latest.new_state != fine.current_state,
            format!(
                "Status mismatch: fine is {} but the latest history entry records {}",
                fine.current_state, latest.new_state
            ),
        );
    }

    builder.check(registration.timestamp == 0, "Registration timestamp is zero");

    builder.check(
        total == 0 && fine.current_state != FineState::INITIAL,
        format!("Status {} present without history", fine.current_state),
    );

    let mut previous = FineState::INITIAL;
    for (position, update) in page.iter().enumerate() {
        builder.check(
            update.old_state != previous,
            format!(
                "History entry {} starts from {} but the previous status was {}",
                position + 1,
                update.old_state,
                previous
            ),
        );
        previous = update.new_state;
    }

    builder.finish()
}
