//! Fan-out port
//!
//! Everything that walks many fines (plate lookups, the activity feed,
//! integrity checks) reads through `FineDirectory` rather than the gateway
//! directly. `LedgerGateway` is the only implementation here; a caching
//! decorator would implement the same trait.

use crate::gateway::{LedgerGateway, StatusHistoryPage};
use async_trait::async_trait;
use multa_core::{Fine, FineId, RegistrationDetails, Result, StatusUpdate};
use std::sync::Arc;

/// Read access to fines and their status logs.
#[async_trait]
pub trait FineDirectory: Send + Sync {
    /// Number of fines ever registered.
    async fn fine_count(&self) -> Result<u64>;

    /// One fine; `NotFound` outside `1..=count`.
    async fn fine(&self, fine_id: u64) -> Result<Fine>;

    /// One 1-based page of fines.
    async fn fines_page(&self, page: u64, page_size: u64) -> Result<Vec<Fine>>;

    /// Ids recorded for a plate.
    async fn plate_fine_ids(&self, plate_number: &str) -> Result<Vec<u64>>;

    /// Registration block and time.
    async fn registration(&self, fine_id: FineId) -> Result<RegistrationDetails>;

    /// One page of a status log.
    async fn history_page(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage>;

    /// A whole status log, oldest first.
    async fn full_history(&self, fine_id: FineId) -> Result<Vec<StatusUpdate>>;
}

#[async_trait]
impl FineDirectory for LedgerGateway {
    async fn fine_count(&self) -> Result<u64> {
        LedgerGateway::fine_count(self).await
    }

    async fn fine(&self, fine_id: u64) -> Result<Fine> {
        self.fine_details(fine_id).await
    }

    async fn fines_page(&self, page: u64, page_size: u64) -> Result<Vec<Fine>> {
        self.fines_details(page, page_size).await
    }

    async fn plate_fine_ids(&self, plate_number: &str) -> Result<Vec<u64>> {
        self.fines_by_plate(plate_number).await
    }

    async fn registration(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        self.registration_details(fine_id).await
    }

    async fn history_page(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage> {
        self.fine_status_history(fine_id, page, page_size).await
    }

    async fn full_history(&self, fine_id: FineId) -> Result<Vec<StatusUpdate>> {
        self.full_status_history(fine_id).await
    }
}

/// Blanket implementation for Arc<T> where T: FineDirectory
#[async_trait]
impl<T: FineDirectory + ?Sized> FineDirectory for Arc<T> {
    async fn fine_count(&self) -> Result<u64> {
        (**self).fine_count().await
    }

    async fn fine(&self, fine_id: u64) -> Result<Fine> {
        (**self).fine(fine_id).await
    }

    async fn fines_page(&self, page: u64, page_size: u64) -> Result<Vec<Fine>> {
        (**self).fines_page(page, page_size).await
    }

    async fn plate_fine_ids(&self, plate_number: &str) -> Result<Vec<u64>> {
        (**self).plate_fine_ids(plate_number).await
    }

    async fn registration(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        (**self).registration(fine_id).await
    }

    async fn history_page(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<StatusHistoryPage> {
        (**self).history_page(fine_id, page, page_size).await
    }

    async fn full_history(&self, fine_id: FineId) -> Result<Vec<StatusUpdate>> {
        (**self).full_history(fine_id).await
    }
}
