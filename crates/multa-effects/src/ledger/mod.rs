//! Ledger access over Ethereum JSON-RPC.

mod handler;
pub mod rpc;

pub use handler::JsonRpcLedgerHandler;
