//! Multa Effects - production handlers
//!
//! Network-backed implementations of the effect traits in `multa-core`:
//!
//! - `JsonRpcLedgerHandler`: the fine contract over Ethereum JSON-RPC, both
//!   the typed binding and the raw-calldata path
//! - `KuboContentNode`: primary content node through its HTTP API
//! - `GatewayContentNode`: read-only HTTP gateway, the fallback path
//! - `SimitHttpClient`: external SIMIT lookup

#![forbid(unsafe_code)]

pub mod content;
pub mod ledger;
pub mod simit;

pub use content::{GatewayContentNode, KuboContentNode};
pub use ledger::JsonRpcLedgerHandler;
pub use simit::SimitHttpClient;
