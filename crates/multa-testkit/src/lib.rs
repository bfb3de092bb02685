//! Multa Testing Infrastructure
//!
//! Stateful in-memory handlers for the ledger and content-node effect
//! traits, plus fixtures. Handlers are cheap to clone and share state, so a
//! test can hand one clone to the code under test and keep another to
//! inject faults and read call counters.
//!
//! # Usage
//!
//! ```rust,no_run
//! use multa_testkit::*;
//!
//! # async fn demo() {
//! let ledger = MemoryLedger::new();
//! ledger.suppress_events(true);
//! let id = ledger.seed_fine(new_fine(SAMPLE_PLATE, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG")).await;
//! assert_eq!(id.value(), 1);
//! # }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod content;
pub mod fixtures;
pub mod ledger;

pub use content::{compute_cid_v0, MemoryContentNode, DEFAULT_CHUNK_SIZE};
pub use fixtures::*;
pub use ledger::{
    MemoryLedger, BLOCK_TIME_SECS, DEFAULT_ACCOUNT, DEFAULT_CONTRACT, FOREIGN_CONTRACT,
    FOREIGN_FINE_ID, GENESIS_TIME,
};
