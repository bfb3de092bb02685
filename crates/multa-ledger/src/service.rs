//! Fines service
//!
//! Use-case facade over the ledger gateway and the evidence store. Every
//! operation the request layer exposes maps to one method here. Input is
//! validated before anything touches the network, and status transitions are
//! checked against [`FineStateMachine`] before a transaction is paid for.

use crate::aggregator::HistoryAggregator;
use crate::directory::FineDirectory;
use crate::gateway::{LedgerGateway, StatusHistoryPage};
use crate::integrity::IntegrityVerifier;
use futures::future::try_join_all;
use multa_core::fine::validate_text;
use multa_core::{
    EvidenceBlob, EvidenceCid, Fine, FineFields, FineId, FineIdSource, FineState, FineStateMachine,
    HistoryEvent, IntegrityReport, MultaError, PlateNumber, RegisteredFineId, Result,
    SimitEffects, SimitFine, TxHash,
};
use multa_store::EvidenceStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of `register_fine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredFine {
    /// Assigned id
    pub fine_id: FineId,
    /// Whether the id came from the registration event or the fine count
    pub fine_id_source: FineIdSource,
    /// Uploaded evidence
    #[serde(rename = "evidenceCID")]
    pub evidence_cid: EvidenceCid,
    /// Registration transaction
    pub transaction_hash: TxHash,
}

/// What is owed on a fine at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountDue {
    /// Fine id
    pub fine_id: FineId,
    /// Registered cost
    pub cost: u64,
    /// Pending past the payment window
    pub overdue: bool,
    /// Cost including any late fee
    pub amount_due: u64,
}

/// Reachability of the collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Ledger reachable and contract deployed, evidence node reachable
    pub healthy: bool,
    /// Contract code present at the configured address
    pub contract_deployed: bool,
    /// Why the ledger probe failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<String>,
    /// Primary evidence node answered its probe
    pub evidence_connected: bool,
    /// SIMIT reachability, absent when not configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simit_reachable: Option<bool>,
}

/// Facade the request layer calls.
#[derive(Clone)]
pub struct FinesService {
    gateway: LedgerGateway,
    directory: Arc<dyn FineDirectory>,
    evidence: EvidenceStore,
    simit: Option<Arc<dyn SimitEffects>>,
}

impl std::fmt::Debug for FinesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinesService")
            .field("evidence", &self.evidence)
            .field("simit", &self.simit.is_some())
            .finish_non_exhaustive()
    }
}

impl FinesService {
    /// Service reading fines straight from the gateway.
    pub fn new(gateway: LedgerGateway, evidence: EvidenceStore) -> Self {
        Self {
            directory: Arc::new(gateway.clone()),
            gateway,
            evidence,
            simit: None,
        }
    }

    /// Read fines through another directory, e.g. a caching one.
    pub fn with_directory(mut self, directory: Arc<dyn FineDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Enable the SIMIT lookup.
    pub fn with_simit(mut self, simit: Arc<dyn SimitEffects>) -> Self {
        self.simit = Some(simit);
        self
    }

    /// Underlying gateway.
    pub fn gateway(&self) -> &LedgerGateway {
        &self.gateway
    }

    /// Underlying evidence store.
    pub fn evidence_store(&self) -> &EvidenceStore {
        &self.evidence
    }

    /// Validate the fields, upload the evidence, then register on the ledger.
    #[tracing::instrument(skip(self, evidence, fields), fields(size = evidence.len()))]
    pub async fn register_fine(
        &self,
        evidence: Vec<u8>,
        file_name: &str,
        fields: FineFields,
    ) -> Result<RegisteredFine> {
        fields.validate()?;
        if evidence.is_empty() {
            return Err(MultaError::validation("Evidence file is required"));
        }

        let evidence_cid = self.evidence.upload(evidence, file_name).await?;
        let new_fine = fields.into_new_fine(&evidence_cid)?;
        let registration = self.gateway.register_fine(&new_fine).await?;

        if let RegisteredFineId::DerivedFromCount(id) = registration.fine_id {
            warn!(fine_id = %id, "Registered fine id was derived from the fine count");
        }
        Ok(RegisteredFine {
            fine_id: registration.fine_id.id(),
            fine_id_source: registration.fine_id.source(),
            evidence_cid,
            transaction_hash: registration.transaction_hash,
        })
    }

    /// Move a fine to `new_state`. Forbidden transitions are rejected before
    /// any submission.
    #[tracing::instrument(skip(self, reason))]
    pub async fn update_fine_status(
        &self,
        fine_id: u64,
        new_state: FineState,
        reason: &str,
    ) -> Result<TxHash> {
        validate_text("Reason", reason)?;
        let fine = self.directory.fine(fine_id).await?;
        FineStateMachine::validate_transition(fine.current_state, new_state)?;
        let tx_hash = self
            .gateway
            .update_fine_status(fine.id, new_state, reason.trim())
            .await?;
        info!(from = %fine.current_state, to = %new_state, "Transition applied");
        Ok(tx_hash)
    }

    /// One fine.
    pub async fn fine(&self, fine_id: u64) -> Result<Fine> {
        self.directory.fine(fine_id).await
    }

    /// One page of fines.
    pub async fn fines(&self, page: u64, page_size: u64) -> Result<Vec<Fine>> {
        self.directory.fines_page(page, page_size).await
    }

    /// Every fine recorded for a plate, resolved one by one.
    pub async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<Fine>> {
        let plate = PlateNumber::parse(plate_number)?;
        let ids = self.directory.plate_fine_ids(plate.as_str()).await?;
        try_join_all(ids.into_iter().map(|id| self.directory.fine(id))).await
    }

    /// One page of a fine's status log. Unknown fines are `NotFound`.
    pub async fn status_history(
        &self,
        fine_id: u64,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage> {
        let fine = self.directory.fine(fine_id).await?;
        self.directory.history_page(fine.id, page, page_size).await
    }

    /// Integrity report for a fine. Never fails.
    pub async fn integrity(&self, fine_id: u64) -> IntegrityReport {
        IntegrityVerifier::new(self.directory.clone())
            .verify(fine_id)
            .await
    }

    /// Cost owed on a fine at `now` (unix seconds).
    pub async fn amount_due(&self, fine_id: u64, now: u64) -> Result<AmountDue> {
        let fine = self.directory.fine(fine_id).await?;
        Ok(AmountDue {
            fine_id: fine.id,
            cost: fine.cost,
            overdue: FineStateMachine::is_overdue(&fine, now),
            amount_due: FineStateMachine::cost_with_late_fee(&fine, now),
        })
    }

    /// Evidence by identifier. Malformed identifiers fail before any store call.
    pub async fn evidence(&self, cid: &str) -> Result<EvidenceBlob> {
        self.evidence.get_str(cid).await
    }

    /// Recent-activity feed.
    pub async fn recent_history(&self) -> Result<Vec<HistoryEvent>> {
        HistoryAggregator::new(self.directory.clone())
            .recent_history()
            .await
    }

    /// Probe the ledger, the evidence node and SIMIT when configured.
    pub async fn health(&self) -> HealthReport {
        let simit = async {
            match &self.simit {
                Some(simit) => Some(simit.check_connection().await),
                None => None,
            }
        };
        let (contract, evidence_connected, simit_reachable) = futures::join!(
            self.gateway.verify_contract(),
            self.evidence.is_connected(),
            simit
        );

        let (contract_deployed, ledger_error) = match contract {
            Ok(deployed) => (deployed, None),
            Err(err) => (false, Some(err.to_string())),
        };
        HealthReport {
            healthy: contract_deployed && evidence_connected,
            contract_deployed,
            ledger_error,
            evidence_connected,
            simit_reachable,
        }
    }

    /// Fines SIMIT holds for a plate.
    pub async fn external_fines_by_plate(&self, plate_number: &str) -> Result<Vec<SimitFine>> {
        let plate = PlateNumber::parse(plate_number)?;
        let simit = self
            .simit
            .as_ref()
            .ok_or_else(|| MultaError::configuration("SIMIT lookup is not configured"))?;
        simit.fines_by_plate(plate.as_str()).await
    }

    /// Move a fine to `new_state`, recording a SIMIT reference as the reason.
    /// The transition is checked like any other status update.
    #[tracing::instrument(skip(self, simit_id))]
    pub async fn link_to_simit(
        &self,
        fine_id: u64,
        new_state: FineState,
        simit_id: &str,
    ) -> Result<TxHash> {
        let fine = self.directory.fine(fine_id).await?;
        FineStateMachine::validate_transition(fine.current_state, new_state)?;
        self.gateway
            .link_external_reference(fine.id, new_state, simit_id)
            .await
    }
}
