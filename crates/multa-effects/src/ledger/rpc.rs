//! JSON-RPC envelopes and the hex encodings the ledger node speaks.

use multa_core::contract::{decode_revert_reason, LogEntry};
use multa_core::{LedgerAddress, MultaError, Result, TxHash, TxReceipt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const REVERT_PREFIX: &str = "execution reverted";

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    /// Node-specific code
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Revert data or extra detail
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcError {
    /// Revert reason carried by the error, from the ABI-encoded revert data
    /// when present, otherwise from an `execution reverted: <reason>` message.
    pub fn revert_reason(&self) -> Option<String> {
        let from_data = self
            .data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|data| decode_hex(data).ok())
            .and_then(|bytes| decode_revert_reason(&bytes));
        from_data.or_else(|| {
            self.message
                .strip_prefix(REVERT_PREFIX)
                .map(|rest| rest.trim_start_matches(':').trim())
                .filter(|reason| !reason.is_empty())
                .map(str::to_string)
        })
    }
}

/// A failed JSON-RPC exchange.
#[derive(Debug, Clone)]
pub(crate) enum RpcFault {
    /// Request never produced a usable response
    Transport(String),
    /// Node answered with an error object
    Node(RpcError),
}

impl RpcFault {
    pub fn revert_reason(&self) -> Option<String> {
        match self {
            Self::Transport(_) => None,
            Self::Node(err) => err.revert_reason(),
        }
    }
}

impl std::fmt::Display for RpcFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => f.write_str(message),
            Self::Node(err) => write!(f, "{} (code {})", err.message, err.code),
        }
    }
}

/// `0x`-prefixed lower-case hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed hex; an empty payload (`0x`) is zero bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| MultaError::serialization(format!("Invalid hex {value}: {e}")))
}

/// Decode a hex quantity such as `0x1b4`.
pub fn decode_quantity(value: &str) -> Result<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| MultaError::serialization(format!("Invalid quantity {value}: {e}")))
}

/// Encode a quantity as minimal hex.
pub fn encode_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLog {
    address: String,
    topics: Vec<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceipt {
    transaction_hash: String,
    block_number: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs: Vec<WireLog>,
}

fn topic(value: &str) -> Result<[u8; 32]> {
    decode_hex(value)?
        .try_into()
        .map_err(|_| MultaError::serialization(format!("Invalid log topic {value}")))
}

/// Parse an `eth_getTransactionReceipt` result. The revert reason is left
/// empty; the node does not report it in receipts.
pub fn parse_receipt(value: Value) -> Result<TxReceipt> {
    let wire: WireReceipt = serde_json::from_value(value)?;
    let logs = wire
        .logs
        .into_iter()
        .map(|log| {
            Ok(LogEntry {
                address: log.address.parse::<LedgerAddress>()?,
                topics: log.topics.iter().map(|t| topic(t)).collect::<Result<_>>()?,
                data: decode_hex(&log.data)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TxReceipt {
        tx_hash: wire.transaction_hash.parse::<TxHash>()?,
        block_number: decode_quantity(&wire.block_number)?,
        succeeded: wire
            .status
            .as_deref()
            .map_or(true, |s| matches!(decode_quantity(s), Ok(1))),
        logs,
        revert_reason: None,
    })
}
