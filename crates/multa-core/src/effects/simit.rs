//! External SIMIT lookup.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fine status as SIMIT reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum SimitFineStatus {
    Pending,
    Paid,
    InProcess,
    Cancelled,
}

/// A fine as recorded in SIMIT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SimitFine {
    pub simit_id: String,
    pub plate_number: String,
    pub infraction_type: String,
    pub infraction_date: String,
    pub location: String,
    pub cost: u64,
    pub status: SimitFineStatus,
    pub payment_deadline: String,
}

/// Read access to the SIMIT registry.
#[async_trait]
pub trait SimitEffects: Send + Sync {
    /// Fines SIMIT holds for a plate.
    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<SimitFine>>;

    /// Non-throwing reachability probe.
    async fn check_connection(&self) -> bool;
}

/// Blanket implementation for Arc<T> where T: SimitEffects
#[async_trait]
impl<T: SimitEffects + ?Sized> SimitEffects for Arc<T> {
    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<SimitFine>> {
        (**self).fines_by_plate(plate_number).await
    }

    async fn check_connection(&self) -> bool {
        (**self).check_connection().await
    }
}
