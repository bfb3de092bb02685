//! JSON-RPC handler for the deployed fine contract.

use super::rpc::{
    decode_hex, encode_hex, encode_quantity, parse_receipt, RpcFault, RpcRequest, RpcResponse,
};
use async_trait::async_trait;
use multa_core::contract::calls::{
    decode_fine_count, decode_fine_details, decode_fines_by_plate, decode_fines_details,
    decode_registration_details, decode_status_history,
};
use multa_core::contract::{RawFine, RegistryCall};
use multa_core::{
    FineId, FineRegistryEffects, FineState, LedgerAddress, LedgerConfig, MultaError, NewFine,
    RawCallEffects, RegistrationDetails, Result, StatusUpdate, TxHash, TxReceipt,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Ledger handler speaking Ethereum JSON-RPC to a single node.
///
/// Reads go through `eth_call`. Submissions use `eth_sendTransaction`, so
/// the node must hold the sending account unlocked. When no sender is
/// configured the node's first account is used.
pub struct JsonRpcLedgerHandler {
    client: reqwest::Client,
    rpc_url: String,
    contract: LedgerAddress,
    sender: OnceCell<LedgerAddress>,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl std::fmt::Debug for JsonRpcLedgerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcLedgerHandler")
            .field("rpc_url", &self.rpc_url)
            .field("contract", &self.contract)
            .field("sender", &self.sender.get())
            .finish_non_exhaustive()
    }
}

impl JsonRpcLedgerHandler {
    /// Build a handler from validated ledger settings.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        if config.contract_address.is_empty() {
            return Err(MultaError::configuration(
                "ledger.contract_address is required to reach the fine contract",
            ));
        }
        let contract = config.contract_address.parse::<LedgerAddress>()?;
        let sender = if config.from_account.is_empty() {
            OnceCell::new()
        } else {
            OnceCell::new_with(Some(config.from_account.parse::<LedgerAddress>()?))
        };
        Ok(Self {
            client: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            contract,
            sender,
            confirmation_timeout: Duration::from_millis(config.confirmation_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            next_id: AtomicU64::new(1),
        })
    }

    /// Address of the contract this handler talks to.
    pub fn contract(&self) -> LedgerAddress {
        self.contract
    }

    async fn rpc(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFault> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcFault::Transport(format!("Failed to reach ledger node: {}", e)))?;

        if !response.status().is_success() {
            return Err(RpcFault::Transport(format!(
                "Ledger node rejected {}: {}",
                method,
                response.status()
            )));
        }

        let body: RpcResponse = response.json().await.map_err(|e| {
            RpcFault::Transport(format!("Failed to parse ledger response: {}", e))
        })?;

        match (body.result, body.error) {
            (_, Some(error)) => Err(RpcFault::Node(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    fn call_object(&self, calldata: &[u8]) -> Value {
        json!({ "to": self.contract.to_string(), "data": encode_hex(calldata) })
    }

    async fn eth_call(&self, call: &RegistryCall) -> Result<Vec<u8>> {
        self.raw_eth_call(call.encode(), "latest".into(), call.signature())
            .await
    }

    async fn raw_eth_call(&self, calldata: Vec<u8>, block: Value, label: &str) -> Result<Vec<u8>> {
        let result = self
            .rpc("eth_call", json!([self.call_object(&calldata), block]))
            .await
            .map_err(|fault| {
                let message = match fault.revert_reason() {
                    Some(reason) => format!("{} reverted: {}", label, reason),
                    None => format!("{} failed: {}", label, fault),
                };
                MultaError::ledger_read(message)
            })?;
        let hex = result
            .as_str()
            .ok_or_else(|| MultaError::ledger_read(format!("{} returned no data", label)))?;
        let data = decode_hex(hex)?;
        if data.is_empty() {
            return Err(MultaError::ledger_read(format!(
                "{} returned empty data; is the contract deployed?",
                label
            )));
        }
        Ok(data)
    }

    async fn sender(&self) -> Result<LedgerAddress> {
        self.sender
            .get_or_try_init(|| async {
                let accounts = self
                    .rpc("eth_accounts", json!([]))
                    .await
                    .map_err(|e| {
                        MultaError::ledger_write(format!("Failed to list accounts: {}", e))
                    })?;
                let first = accounts
                    .as_array()
                    .and_then(|list| list.first())
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        MultaError::configuration(
                            "ledger.from_account is unset and the node has no unlocked accounts",
                        )
                    })?;
                let account = first.parse::<LedgerAddress>()?;
                info!(%account, "Using node account for submissions");
                Ok::<_, MultaError>(account)
            })
            .await
            .copied()
    }

    async fn send(&self, call: RegistryCall) -> Result<TxHash> {
        let from = self.sender().await?;
        let tx = json!({
            "from": from.to_string(),
            "to": self.contract.to_string(),
            "data": encode_hex(&call.encode()),
        });
        let result = self
            .rpc("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|fault| {
                MultaError::reverted(
                    format!("{} was not accepted: {}", call.signature(), fault),
                    fault.revert_reason(),
                )
            })?;
        let hash = result
            .as_str()
            .ok_or_else(|| MultaError::ledger_write("Node returned no transaction hash"))?
            .parse::<TxHash>()?;
        debug!(tx = %hash, call = call.signature(), "Transaction submitted");
        Ok(hash)
    }

    /// Re-execute a reverted transaction at its block to recover the reason.
    async fn replay_revert_reason(&self, tx_hash: &TxHash, block: u64) -> Option<String> {
        let tx = self
            .rpc("eth_getTransactionByHash", json!([tx_hash.to_string()]))
            .await
            .ok()?;
        let input = tx.get("input").and_then(Value::as_str)?;
        let replay = json!({
            "from": tx.get("from").cloned().unwrap_or(Value::Null),
            "to": self.contract.to_string(),
            "data": input,
        });
        match self
            .rpc("eth_call", json!([replay, encode_quantity(block)]))
            .await
        {
            Err(fault) => fault.revert_reason(),
            Ok(_) => None,
        }
    }

    async fn poll_receipt(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        loop {
            match self
                .rpc("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
                .await
            {
                Ok(Value::Null) => {}
                Ok(value) => return parse_receipt(value),
                Err(fault) => warn!(tx = %tx_hash, "Receipt poll failed: {}", fault),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl FineRegistryEffects for JsonRpcLedgerHandler {
    fn contract_address(&self) -> LedgerAddress {
        self.contract
    }

    async fn submit_registration(&self, fine: &NewFine) -> Result<TxHash> {
        self.send(RegistryCall::register(fine)).await
    }

    async fn submit_status_update(
        &self,
        fine_id: FineId,
        new_state: FineState,
        reason: &str,
    ) -> Result<TxHash> {
        self.send(RegistryCall::UpdateFineStatus {
            fine_id: fine_id.value(),
            new_state: new_state.code(),
            reason: reason.to_string(),
        })
        .await
    }

    async fn confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        let mut receipt = tokio::time::timeout(self.confirmation_timeout, self.poll_receipt(tx_hash))
            .await
            .map_err(|_| {
                MultaError::ledger_write(format!(
                    "Transaction {} not confirmed within {}ms",
                    tx_hash,
                    self.confirmation_timeout.as_millis()
                ))
            })??;
        if !receipt.succeeded {
            receipt.revert_reason = self
                .replay_revert_reason(tx_hash, receipt.block_number)
                .await;
        }
        Ok(receipt)
    }

    async fn fine_count(&self) -> Result<u64> {
        decode_fine_count(&self.eth_call(&RegistryCall::FineCount).await?)
    }

    async fn fine_details(&self, fine_id: FineId) -> Result<RawFine> {
        let data = self
            .eth_call(&RegistryCall::FineDetails {
                fine_id: fine_id.value(),
            })
            .await?;
        decode_fine_details(&data)
    }

    async fn fines_details(&self, page: u64, page_size: u64) -> Result<Vec<RawFine>> {
        let data = self
            .eth_call(&RegistryCall::FinesDetails { page, page_size })
            .await?;
        decode_fines_details(&data)
    }

    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<u64>> {
        let data = self
            .eth_call(&RegistryCall::FinesByPlate {
                plate_number: plate_number.to_string(),
            })
            .await?;
        decode_fines_by_plate(&data)
    }

    async fn registration_details(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        let data = self
            .eth_call(&RegistryCall::RegistrationDetails {
                fine_id: fine_id.value(),
            })
            .await?;
        decode_registration_details(&data)
    }

    async fn status_history(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<StatusUpdate>, u64)> {
        let data = self
            .eth_call(&RegistryCall::StatusHistory {
                fine_id: fine_id.value(),
                page,
                page_size,
            })
            .await?;
        let (raw, total) = decode_status_history(&data)
            .map_err(|e| MultaError::ledger_read(format!("Undecodable status history: {}", e)))?;
        let updates = raw
            .into_iter()
            .map(|entry| entry.into_status_update(fine_id))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| MultaError::ledger_read(format!("Undecodable status history: {}", e)))?;
        Ok((updates, total))
    }

    async fn contract_deployed(&self) -> Result<bool> {
        let code = self
            .rpc("eth_getCode", json!([self.contract.to_string(), "latest"]))
            .await
            .map_err(|e| MultaError::ledger_read(format!("Failed to read contract code: {}", e)))?;
        let code = code.as_str().unwrap_or("0x");
        Ok(decode_hex(code).map(|bytes| !bytes.is_empty()).unwrap_or(false))
    }
}

#[async_trait]
impl RawCallEffects for JsonRpcLedgerHandler {
    async fn raw_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>> {
        // eth_call would simulate a write and discard it
        if matches!(RegistryCall::decode(&calldata), Ok(call) if call.is_write()) {
            return Err(MultaError::validation(
                "eth_call cannot execute a state-changing function",
            ));
        }
        self.raw_eth_call(calldata, "latest".into(), "raw call").await
    }
}
