//! Effect trait definitions.
//!
//! Traits define **what** side effects the domain crates may perform;
//! handlers in `multa-effects` (production) and `multa-testkit` (in-memory)
//! define **how**. Domain code receives handlers as `Arc<dyn …Effects>` and
//! never constructs a network client itself.

pub mod content;
pub mod ledger;
pub mod simit;

pub use content::{ChunkStream, ContentNodeEffects};
pub use ledger::{FineRegistryEffects, RawCallEffects, TxReceipt};
pub use simit::{SimitEffects, SimitFine, SimitFineStatus};
