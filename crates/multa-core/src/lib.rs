//! Multa Core - foundation of the fine ledger integration layer
//!
//! Domain types, pure decision logic and effect interfaces shared by every
//! other crate. Nothing in here performs I/O.
//!
//! # Contents
//!
//! ## Domain Types
//! - `Fine`, `StatusUpdate`, `FineId`, `PlateNumber`, `InfractionType`
//! - `EvidenceCid`, `EvidenceBlob`: content-addressed evidence
//! - `IntegrityReport`, `HistoryEvent`: derived views
//!
//! ## Decision Logic
//! - `FineStateMachine`: transition table, appeal/finality rules, late fees
//!
//! ## Ledger ABI
//! - `contract`: call encoding, result decoding and event parsing for the
//!   deployed fine contract
//!
//! ## Effect Interfaces
//! - `FineRegistryEffects`, `RawCallEffects`: typed and raw ledger access
//! - `ContentNodeEffects`: a content-addressed storage node
//! - `SimitEffects`: external SIMIT lookup

#![forbid(unsafe_code)]

/// Runtime configuration
pub mod config;

/// Fixed contract ABI
pub mod contract;

/// Effect traits (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Evidence identifiers and blobs
pub mod evidence;

/// Fine records and registration input
pub mod fine;

/// Recent-activity feed entries
pub mod history;

/// Integrity verification report
pub mod integrity;

/// Fine status and transition rules
pub mod state;

pub use config::{
    ConfigValidationError, Environment, EvidenceConfig, LedgerConfig, MultaConfig, SimitConfig,
};
pub use effects::{
    ChunkStream, ContentNodeEffects, FineRegistryEffects, RawCallEffects, SimitEffects, SimitFine,
    SimitFineStatus, TxReceipt,
};
pub use errors::{ErrorResponse, MultaError, Result};
pub use evidence::{EvidenceBlob, EvidenceCid};
pub use fine::{
    Fine, FineFields, FineId, FineIdSource, FineRegistration, InfractionType, LedgerAddress,
    NewFine, PlateNumber, RegisteredFineId, RegistrationDetails, StatusUpdate, TxHash, MAX_COST,
    MAX_TEXT_LEN,
};
pub use history::{format_ledger_timestamp, HistoryEvent, RECENT_HISTORY_LIMIT};
pub use integrity::{IntegrityReport, IntegrityReportBuilder, ALL_CHECKS_PASSED};
pub use state::{FineState, FineStateMachine, LATE_FEE_PERCENT, PAYMENT_WINDOW_SECS};
