//! Ledger effect traits.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `multa-effects` (JSON-RPC), `multa-testkit` (in-memory)
//! - **Usage**: `multa-ledger` gateway
//!
//! Two ports cover the same contract. `FineRegistryEffects` is the typed
//! binding; `RawCallEffects` takes pre-encoded calldata and returns raw
//! return data, which lets the gateway encode and decode a call itself when
//! the typed binding misbehaves.

use crate::contract::{LogEntry, RawFine};
use crate::errors::Result;
use crate::fine::{FineId, LedgerAddress, NewFine, RegistrationDetails, StatusUpdate, TxHash};
use crate::state::FineState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Receipt of a transaction included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction the receipt belongs to
    pub tx_hash: TxHash,
    /// Including block
    pub block_number: u64,
    /// False when execution reverted
    pub succeeded: bool,
    /// Emitted logs, empty for a reverted transaction
    pub logs: Vec<LogEntry>,
    /// Revert reason, when the node reports one
    pub revert_reason: Option<String>,
}

/// Typed binding to the fine contract.
///
/// Submissions return as soon as the node accepted the transaction;
/// `confirmation` waits for inclusion. Read methods fail with
/// `MultaError::LedgerRead` when the node cannot answer.
#[async_trait]
pub trait FineRegistryEffects: Send + Sync {
    /// Address of the bound contract. Only logs emitted from it are trusted.
    fn contract_address(&self) -> LedgerAddress;

    /// Submit `registerFine`.
    async fn submit_registration(&self, fine: &NewFine) -> Result<TxHash>;

    /// Submit `updateFineStatus`. No transition checks happen here.
    async fn submit_status_update(
        &self,
        fine_id: FineId,
        new_state: FineState,
        reason: &str,
    ) -> Result<TxHash>;

    /// Wait until `tx_hash` is included in a block.
    async fn confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt>;

    /// `getAllFineCount`
    async fn fine_count(&self) -> Result<u64>;

    /// `getFineDetails`
    async fn fine_details(&self, fine_id: FineId) -> Result<RawFine>;

    /// `getFinesDetails`, 1-based pages
    async fn fines_details(&self, page: u64, page_size: u64) -> Result<Vec<RawFine>>;

    /// `getFinesByPlate`
    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<u64>>;

    /// `getFineRegistrationDetails`
    async fn registration_details(&self, fine_id: FineId) -> Result<RegistrationDetails>;

    /// `getFineStatusHistory`: one page, oldest first, with the total entry count.
    async fn status_history(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<StatusUpdate>, u64)>;

    /// Whether contract code is present at the configured address.
    async fn contract_deployed(&self) -> Result<bool>;
}

/// Read-only call with caller-encoded calldata.
#[async_trait]
pub trait RawCallEffects: Send + Sync {
    /// Execute `calldata` against the contract and return the raw result.
    async fn raw_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>>;
}

/// Blanket implementation for Arc<T> where T: FineRegistryEffects
#[async_trait]
impl<T: FineRegistryEffects + ?Sized> FineRegistryEffects for Arc<T> {
    fn contract_address(&self) -> LedgerAddress {
        (**self).contract_address()
    }

    async fn submit_registration(&self, fine: &NewFine) -> Result<TxHash> {
        (**self).submit_registration(fine).await
    }

    async fn submit_status_update(
        &self,
        fine_id: FineId,
        new_state: FineState,
        reason: &str,
    ) -> Result<TxHash> {
        (**self).submit_status_update(fine_id, new_state, reason).await
    }

    async fn confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        (**self).confirmation(tx_hash).await
    }

    async fn fine_count(&self) -> Result<u64> {
        (**self).fine_count().await
    }

    async fn fine_details(&self, fine_id: FineId) -> Result<RawFine> {
        (**self).fine_details(fine_id).await
    }

    async fn fines_details(&self, page: u64, page_size: u64) -> Result<Vec<RawFine>> {
        (**self).fines_details(page, page_size).await
    }

    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<u64>> {
        (**self).fines_by_plate(plate_number).await
    }

    async fn registration_details(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        (**self).registration_details(fine_id).await
    }

    async fn status_history(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<StatusUpdate>, u64)> {
        (**self).status_history(fine_id, page, page_size).await
    }

    async fn contract_deployed(&self) -> Result<bool> {
        (**self).contract_deployed().await
    }
}

/// Blanket implementation for Arc<T> where T: RawCallEffects
#[async_trait]
impl<T: RawCallEffects + ?Sized> RawCallEffects for Arc<T> {
    async fn raw_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>> {
        (**self).raw_call(calldata).await
    }
}
