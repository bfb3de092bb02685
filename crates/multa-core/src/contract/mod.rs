//! Fixed ABI of the deployed fine contract.
//!
//! The contract itself is opaque; this module only knows how to encode calls
//! to it and decode what it returns.

pub mod abi;
pub mod calls;

pub use abi::{decode_revert_reason, encode_revert_reason, keccak256, selector};
pub use calls::{
    decode_fine_registered, fine_registered_log, fine_registered_topic, results, signatures,
    LogEntry, RawFine, RawStatusUpdate, RegistryCall,
};
