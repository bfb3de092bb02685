//! Multa Ledger - fine-shaped access to the ledger and the evidence store
//!
//! # Components
//!
//! - `LedgerGateway`: transaction lifecycle, event-based id recovery,
//!   pagination, typed and raw-ABI status-history reads
//! - `FineDirectory`: read port used by everything that fans out over fines
//! - `IntegrityVerifier`: cross-checks a fine against its status log
//! - `HistoryAggregator`: recent activity across all fines
//! - `FinesService`: the use-case facade over all of the above
//!
//! Handlers are injected; nothing in this crate builds a network client.

#![forbid(unsafe_code)]

pub mod aggregator;
pub mod directory;
pub mod gateway;
pub mod integrity;
pub mod service;

pub use aggregator::{HistoryAggregator, HISTORY_FETCH_CONCURRENCY};
pub use directory::FineDirectory;
pub use gateway::{HistorySource, LedgerGateway, StatusHistoryPage, HISTORY_PAGE_SIZE};
pub use integrity::{IntegrityVerifier, INTEGRITY_PAGE_SIZE};
pub use service::{AmountDue, FinesService, HealthReport, RegisteredFine};
