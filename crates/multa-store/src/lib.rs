//! Multa Store - evidence storage
//!
//! `EvidenceStore` wraps two content-node handlers: a primary node that
//! accepts uploads and serves reads, and an independent fallback path used
//! only for reads when the primary cannot serve them.

#![forbid(unsafe_code)]

pub mod connection;
pub mod store;

pub use connection::ConnectionState;
pub use store::{EvidenceStore, DEFAULT_RETRIEVAL_TIMEOUT};
