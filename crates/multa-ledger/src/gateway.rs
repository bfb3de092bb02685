//! Ledger gateway
//!
//! Fine-shaped reads and writes against the deployed contract. Writes are
//! submitted and then awaited until they are included in a block; the result
//! of a write is never used before its confirmation.
//!
//! Two ledger ports are held: the typed binding, used for everything, and the
//! raw calldata port, used only when the typed status-history read fails.

use crate::integrity::IntegrityVerifier;
use multa_core::contract::calls::decode_status_history;
use multa_core::contract::{decode_fine_registered, RegistryCall};
use multa_core::{
    Fine, FineId, FineRegistration, FineRegistryEffects, FineState, IntegrityReport, MultaError,
    NewFine, RawCallEffects, RegisteredFineId, RegistrationDetails, Result, StatusUpdate, TxHash,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page size used when walking a fine's whole status log.
pub const HISTORY_PAGE_SIZE: u64 = 50;

/// Which path served a status-history page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    /// Typed contract binding
    Typed,
    /// Calldata encoded and decoded by the gateway itself
    RawAbi,
}

/// One page of a fine's status log, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryPage {
    /// Entries on this page
    pub updates: Vec<StatusUpdate>,
    /// Entries in the whole log
    pub total: u64,
    /// Path that produced the page
    pub source: HistorySource,
}

fn write_failure(context: &'static str) -> impl Fn(MultaError) -> MultaError {
    move |err| match err {
        MultaError::LedgerWrite { .. } => err,
        other => MultaError::ledger_write(format!("{context}: {other}")),
    }
}

fn validate_pagination(page: u64, page_size: u64) -> Result<()> {
    if page == 0 || page_size == 0 {
        return Err(MultaError::validation(
            "Page and page size must be positive integers",
        ));
    }
    Ok(())
}

/// Client for the fine contract.
#[derive(Clone)]
pub struct LedgerGateway {
    registry: Arc<dyn FineRegistryEffects>,
    raw: Arc<dyn RawCallEffects>,
}

impl std::fmt::Debug for LedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGateway").finish_non_exhaustive()
    }
}

impl LedgerGateway {
    /// Gateway over separate typed and raw handlers.
    pub fn new(registry: Arc<dyn FineRegistryEffects>, raw: Arc<dyn RawCallEffects>) -> Self {
        Self { registry, raw }
    }

    /// Gateway over one handler that serves both ports.
    pub fn from_handler<H>(handler: H) -> Self
    where
        H: FineRegistryEffects + RawCallEffects + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(handler.clone(), handler)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Register a validated fine and wait for its confirmation.
    ///
    /// The id comes from the `FineRegistered` event when the receipt carries
    /// one. Otherwise it is read from the fine count after confirmation,
    /// which is wrong when another registration lands in the same window;
    /// the result says which path was taken.
    #[tracing::instrument(skip(self, fine), fields(plate = %fine.plate_number))]
    pub async fn register_fine(&self, fine: &NewFine) -> Result<FineRegistration> {
        let tx_hash = self
            .registry
            .submit_registration(fine)
            .await
            .map_err(write_failure("Failed to submit registration"))?;
        debug!(tx_hash = %tx_hash, "Registration submitted");

        let receipt = self
            .registry
            .confirmation(&tx_hash)
            .await
            .map_err(write_failure("Failed to confirm registration"))?;
        if !receipt.succeeded {
            return Err(MultaError::reverted(
                format!("Registration transaction {tx_hash} reverted"),
                receipt.revert_reason,
            ));
        }

        let contract = self.registry.contract_address();
        let emitted = receipt
            .logs
            .iter()
            .filter(|log| log.address == contract)
            .find_map(decode_fine_registered);
        let fine_id = match emitted {
            Some(id) => RegisteredFineId::Found(FineId::new(id).map_err(|_| {
                MultaError::ledger_write("FineRegistered event carried a zero fine id")
            })?),
            None => {
                let count = self
                    .registry
                    .fine_count()
                    .await
                    .map_err(write_failure("Could not determine fine ID from transaction"))?;
                let id = FineId::new(count).map_err(|_| {
                    MultaError::ledger_write(
                        "Could not determine fine ID from transaction: \
                         no FineRegistered event and the fine count is zero",
                    )
                })?;
                warn!(
                    fine_id = %id,
                    tx_hash = %tx_hash,
                    "No FineRegistered event in receipt, fine id derived from count"
                );
                RegisteredFineId::DerivedFromCount(id)
            }
        };

        info!(
            fine_id = %fine_id.id(),
            tx_hash = %tx_hash,
            block = receipt.block_number,
            "Fine registered"
        );
        Ok(FineRegistration {
            fine_id,
            transaction_hash: tx_hash,
        })
    }

    /// Submit a status update and wait for its confirmation.
    ///
    /// No transition rules are applied here; callers check them first.
    #[tracing::instrument(
        skip(self, fine_id, new_state, reason),
        fields(fine_id = %fine_id, new_state = %new_state)
    )]
    pub async fn update_fine_status(
        &self,
        fine_id: FineId,
        new_state: FineState,
        reason: &str,
    ) -> Result<TxHash> {
        let tx_hash = self
            .registry
            .submit_status_update(fine_id, new_state, reason)
            .await
            .map_err(write_failure("Failed to submit status update"))?;
        let receipt = self
            .registry
            .confirmation(&tx_hash)
            .await
            .map_err(write_failure("Failed to confirm status update"))?;
        if !receipt.succeeded {
            return Err(MultaError::reverted(
                format!("Status update transaction {tx_hash} reverted"),
                receipt.revert_reason,
            ));
        }
        info!(tx_hash = %tx_hash, block = receipt.block_number, "Fine status updated");
        Ok(tx_hash)
    }

    /// Move a fine to `new_state` with an external reference recorded as the
    /// reason (`Linked to SIMIT: <id>`).
    ///
    /// The registry reverts an update to the state a fine already holds, so a
    /// link must ride on a real status change. Same-state requests fail with
    /// `Validation` before anything is submitted. Transition rules beyond that
    /// are left to the caller.
    #[tracing::instrument(
        skip(self, fine_id, new_state, external_id),
        fields(fine_id = %fine_id, new_state = %new_state)
    )]
    pub async fn link_external_reference(
        &self,
        fine_id: FineId,
        new_state: FineState,
        external_id: &str,
    ) -> Result<TxHash> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(MultaError::validation("External reference cannot be empty"));
        }
        let fine = self.fine_details(fine_id.value()).await?;
        if fine.current_state == new_state {
            return Err(MultaError::validation(format!(
                "Fine {} is already {}; an external reference must accompany a status change",
                fine.id, new_state
            )));
        }
        self.update_fine_status(
            fine.id,
            new_state,
            &format!("Linked to SIMIT: {external_id}"),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Number of fines ever registered.
    pub async fn fine_count(&self) -> Result<u64> {
        self.registry.fine_count().await
    }

    /// One fine. Ids outside `1..=count` are `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn fine_details(&self, fine_id: u64) -> Result<Fine> {
        let count = self.fine_count().await?;
        if fine_id == 0 || fine_id > count {
            return Err(MultaError::not_found(format!("Fine with ID {fine_id} not found")));
        }
        let id = FineId::new(fine_id)?;
        self.registry.fine_details(id).await?.into_fine()
    }

    /// One page of fines, 1-based. The page size is clamped to the current
    /// count and zeroed slots are dropped.
    #[tracing::instrument(skip(self))]
    pub async fn fines_details(&self, page: u64, page_size: u64) -> Result<Vec<Fine>> {
        validate_pagination(page, page_size)?;
        let count = self.fine_count().await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let raw = self
            .registry
            .fines_details(page, page_size.min(count))
            .await?;
        raw.into_iter()
            .filter(|f| !f.is_empty())
            .map(|f| f.into_fine())
            .collect()
    }

    /// Ids of the fines recorded for `plate_number`. Details are not resolved.
    pub async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<u64>> {
        self.registry.fines_by_plate(plate_number).await
    }

    /// Block and time of a fine's registration.
    pub async fn registration_details(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        self.registry.registration_details(fine_id).await
    }

    /// One page of a fine's status log.
    ///
    /// The typed binding is tried first. When it fails to read, the call is
    /// encoded and decoded here and sent through the raw port; a failure
    /// there is returned as is.
    #[tracing::instrument(skip(self, fine_id), fields(fine_id = %fine_id))]
    pub async fn fine_status_history(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage> {
        validate_pagination(page, page_size)?;
        match self.registry.status_history(fine_id, page, page_size).await {
            Ok((updates, total)) => Ok(StatusHistoryPage {
                updates,
                total,
                source: HistorySource::Typed,
            }),
            Err(err @ MultaError::LedgerRead { .. }) => {
                warn!(error = %err, "Typed status history read failed, using raw ABI path");
                self.raw_status_history(fine_id, page, page_size).await
            }
            Err(err) => Err(err),
        }
    }

    async fn raw_status_history(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage> {
        let calldata = RegistryCall::StatusHistory {
            fine_id: fine_id.value(),
            page,
            page_size,
        }
        .encode();
        let data = self.raw.raw_call(calldata).await?;
        let (raw_updates, total) = decode_status_history(&data)?;
        let updates = raw_updates
            .into_iter()
            .map(|u| u.into_status_update(fine_id))
            .collect::<Result<Vec<_>>>()?;
        debug!(entries = updates.len(), total, "Status history served by raw ABI path");
        Ok(StatusHistoryPage {
            updates,
            total,
            source: HistorySource::RawAbi,
        })
    }

    /// Every entry of a fine's status log, oldest first.
    pub async fn full_status_history(&self, fine_id: FineId) -> Result<Vec<StatusUpdate>> {
        let mut entries = Vec::new();
        let mut page = 1;
        loop {
            let chunk = self
                .fine_status_history(fine_id, page, HISTORY_PAGE_SIZE)
                .await?;
            let exhausted = chunk.updates.is_empty();
            entries.extend(chunk.updates);
            if exhausted || entries.len() as u64 >= chunk.total {
                return Ok(entries);
            }
            page += 1;
        }
    }

    /// Whether contract code is deployed at the configured address.
    pub async fn verify_contract(&self) -> Result<bool> {
        let deployed = self.registry.contract_deployed().await?;
        if !deployed {
            warn!("No contract code at the configured address");
        }
        Ok(deployed)
    }

    /// Cross-check a fine against its status log. Never fails; fetch errors
    /// come back as an invalid report.
    pub async fn verify_blockchain_integrity(&self, fine_id: u64) -> IntegrityReport {
        IntegrityVerifier::new(Arc::new(self.clone()))
            .verify(fine_id)
            .await
    }
}
