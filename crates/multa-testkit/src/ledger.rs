//! In-memory fine contract
//!
//! `MemoryLedger` simulates the deployed contract and the node in front of
//! it. Transactions sit in a mempool until someone waits for their
//! confirmation; the whole mempool is then mined into a single block. This
//! is what lets tests land two registrations in the same confirmation window.
//!
//! Both ledger ports are implemented: the typed binding and the raw
//! calldata path, which decodes the call, executes it and encodes the result.

use async_lock::RwLock;
use async_trait::async_trait;
use multa_core::contract::{
    fine_registered_log, results, LogEntry, RawFine, RawStatusUpdate, RegistryCall,
};
use multa_core::{
    Fine, FineId, FineRegistryEffects, FineState, LedgerAddress, MultaError, NewFine,
    RawCallEffects, RegistrationDetails, Result, StatusUpdate, TxHash, TxReceipt,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Address the simulated contract is deployed at.
pub const DEFAULT_CONTRACT: LedgerAddress = LedgerAddress([0x5f; 20]);

/// Another contract touched by the same transactions when
/// [`MemoryLedger::emit_foreign_events`] is on.
pub const FOREIGN_CONTRACT: LedgerAddress = LedgerAddress([0xee; 20]);

/// Fine id carried by the foreign `FineRegistered` log.
pub const FOREIGN_FINE_ID: u64 = 9_999;

/// Account the simulated node submits from.
pub const DEFAULT_ACCOUNT: LedgerAddress = LedgerAddress([0xf3; 20]);

/// Ledger time before the first block.
pub const GENESIS_TIME: u64 = 1_700_000_000;

/// Seconds between blocks.
pub const BLOCK_TIME_SECS: u64 = 12;

#[derive(Debug, Clone)]
enum PendingCall {
    Register(NewFine),
    UpdateStatus {
        fine_id: u64,
        new_state: FineState,
        reason: String,
    },
}

#[derive(Debug)]
struct PendingTx {
    hash: TxHash,
    call: PendingCall,
    revert: Option<String>,
}

#[derive(Debug)]
struct LedgerState {
    fines: Vec<Fine>,
    registrations: Vec<RegistrationDetails>,
    history: HashMap<u64, Vec<StatusUpdate>>,
    mempool: Vec<PendingTx>,
    receipts: HashMap<TxHash, TxReceipt>,
    block_number: u64,
    now: u64,
    nonce: u64,
    revert_next: Option<String>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            fines: Vec::new(),
            registrations: Vec::new(),
            history: HashMap::new(),
            mempool: Vec::new(),
            receipts: HashMap::new(),
            block_number: 0,
            now: GENESIS_TIME,
            nonce: 0,
            revert_next: None,
        }
    }
}

impl LedgerState {
    fn next_hash(&mut self) -> TxHash {
        self.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"multa-memory-ledger");
        hasher.update(self.nonce.to_be_bytes());
        TxHash(hasher.finalize().into())
    }

    fn fine(&self, fine_id: u64) -> Result<&Fine> {
        usize::try_from(fine_id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.fines.get(index))
            .ok_or_else(|| MultaError::ledger_read("execution reverted: Fine does not exist"))
    }

    fn fine_mut(&mut self, fine_id: u64) -> Option<&mut Fine> {
        let index = usize::try_from(fine_id).ok()?.checked_sub(1)?;
        self.fines.get_mut(index)
    }

    fn execute(
        &mut self,
        call: PendingCall,
        block: u64,
        contract: LedgerAddress,
        account: LedgerAddress,
    ) -> std::result::Result<Vec<LogEntry>, String> {
        let now = self.now;
        match call {
            PendingCall::Register(new_fine) => {
                let id = self.fines.len() as u64 + 1;
                let fine_id = FineId::new(id).map_err(|e| e.to_string())?;
                let log = fine_registered_log(
                    contract,
                    id,
                    new_fine.plate_number.as_str(),
                    &new_fine.evidence_cid,
                );
                self.fines.push(Fine {
                    id: fine_id,
                    plate_number: new_fine.plate_number.as_str().to_string(),
                    evidence_cid: new_fine.evidence_cid,
                    location: new_fine.location,
                    infraction_type: new_fine.infraction_type.code().to_string(),
                    cost: new_fine.cost,
                    owner_identifier: new_fine.owner_identifier,
                    current_state: FineState::INITIAL,
                    registered_by: account,
                    registered_at: now,
                    external_system_id: Some(new_fine.external_system_id)
                        .filter(|s| !s.is_empty()),
                });
                self.registrations.push(RegistrationDetails {
                    block_number: block,
                    timestamp: now,
                });
                Ok(vec![log])
            }
            PendingCall::UpdateStatus {
                fine_id,
                new_state,
                reason,
            } => {
                let fine = self
                    .fine_mut(fine_id)
                    .ok_or_else(|| "Fine does not exist".to_string())?;
                let old_state = fine.current_state;
                if old_state == new_state {
                    return Err("State is already the same".to_string());
                }
                fine.current_state = new_state;
                let id = fine.id;
                self.history.entry(fine_id).or_default().push(StatusUpdate {
                    fine_id: id,
                    old_state,
                    new_state,
                    reason,
                    updated_by: account,
                    timestamp: now,
                });
                Ok(vec![])
            }
        }
    }

    fn fines_page(&self, page: u64, page_size: u64) -> Result<Vec<RawFine>> {
        let range = page_range(page, page_size, self.fines.len())?;
        Ok(self.fines[range].iter().map(RawFine::from).collect())
    }

    fn history_page(
        &self,
        fine_id: u64,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<StatusUpdate>, u64)> {
        self.fine(fine_id)?;
        let entries = self.history.get(&fine_id).map(Vec::as_slice).unwrap_or(&[]);
        let range = page_range(page, page_size, entries.len())?;
        Ok((entries[range].to_vec(), entries.len() as u64))
    }
}

/// 1-based page bounds clamped to `len`.
fn page_range(page: u64, page_size: u64, len: usize) -> Result<std::ops::Range<usize>> {
    if page == 0 || page_size == 0 {
        return Err(MultaError::ledger_read("execution reverted: Invalid pagination"));
    }
    let start = (page - 1).saturating_mul(page_size);
    let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
    let end = usize::try_from(page_size)
        .unwrap_or(usize::MAX)
        .saturating_add(start)
        .min(len);
    Ok(start..end)
}

#[derive(Debug, Default)]
struct Knobs {
    suppress_events: AtomicBool,
    fail_typed_history: AtomicBool,
    offline: AtomicBool,
    undeployed: AtomicBool,
    foreign_events: AtomicBool,
}

#[derive(Debug, Default)]
struct Counters {
    submissions: AtomicUsize,
    confirmations: AtomicUsize,
    reads: AtomicUsize,
    typed_history_calls: AtomicUsize,
    raw_calls: AtomicUsize,
}

/// Simulated contract plus node.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    knobs: Arc<Knobs>,
    counters: Arc<Counters>,
    hold: Arc<watch::Sender<bool>>,
    contract: LedgerAddress,
    account: LedgerAddress,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Empty ledger at `GENESIS_TIME`.
    pub fn new() -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            knobs: Arc::new(Knobs::default()),
            counters: Arc::new(Counters::default()),
            hold: Arc::new(hold),
            contract: DEFAULT_CONTRACT,
            account: DEFAULT_ACCOUNT,
        }
    }

    /// Contract address.
    pub fn contract(&self) -> LedgerAddress {
        self.contract
    }

    /// Submitting account.
    pub fn account(&self) -> LedgerAddress {
        self.account
    }

    // ---- fault injection ----

    /// Drop `FineRegistered` logs from receipts.
    pub fn suppress_events(&self, suppress: bool) {
        self.knobs.suppress_events.store(suppress, Ordering::SeqCst);
    }

    /// Put a `FineRegistered` log from [`FOREIGN_CONTRACT`] ahead of the
    /// contract's own logs in every successful receipt.
    pub fn emit_foreign_events(&self, emit: bool) {
        self.knobs.foreign_events.store(emit, Ordering::SeqCst);
    }

    /// Make the typed `status_history` binding fail with a read error.
    pub fn fail_typed_history(&self, fail: bool) {
        self.knobs.fail_typed_history.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail as if the node were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.knobs.offline.store(offline, Ordering::SeqCst);
    }

    /// Pretend no code is deployed at the contract address.
    pub fn set_deployed(&self, deployed: bool) {
        self.knobs.undeployed.store(!deployed, Ordering::SeqCst);
    }

    /// Block confirmations until `release_confirmations`.
    pub fn hold_confirmations(&self) {
        self.hold.send_replace(true);
    }

    /// Let waiting confirmations proceed. Everything submitted meanwhile is
    /// mined into one block.
    pub fn release_confirmations(&self) {
        self.hold.send_replace(false);
    }

    /// Revert the next submitted transaction with `reason`.
    pub async fn revert_next_write(&self, reason: impl Into<String>) {
        self.state.write().await.revert_next = Some(reason.into());
    }

    /// Overwrite a fine's status without writing a history entry.
    pub async fn tamper_status(&self, fine_id: u64, status: FineState) {
        if let Some(fine) = self.state.write().await.fine_mut(fine_id) {
            fine.current_state = status;
        }
    }

    /// Overwrite a fine's recorded registration time.
    pub async fn tamper_registration_timestamp(&self, fine_id: u64, timestamp: u64) {
        let mut state = self.state.write().await;
        let index = usize::try_from(fine_id).ok().and_then(|id| id.checked_sub(1));
        if let Some(details) = index.and_then(|i| state.registrations.get_mut(i)) {
            details.timestamp = timestamp;
        }
    }

    /// Append a history entry without touching the fine's current status.
    pub async fn inject_history_entry(&self, entry: StatusUpdate) {
        let mut state = self.state.write().await;
        state
            .history
            .entry(entry.fine_id.value())
            .or_default()
            .push(entry);
    }

    /// Set ledger time; the next block is stamped `secs + BLOCK_TIME_SECS`.
    pub async fn set_time(&self, secs: u64) {
        self.state.write().await.now = secs;
    }

    // ---- direct seeding ----

    /// Register and mine immediately, bypassing counters.
    pub async fn seed_fine(&self, fine: NewFine) -> FineId {
        let mut state = self.state.write().await;
        let hash = state.next_hash();
        state.mempool.push(PendingTx {
            hash,
            call: PendingCall::Register(fine),
            revert: None,
        });
        self.mine(&mut state);
        FineId::new(state.fines.len() as u64).expect("a fine was just registered")
    }

    /// Apply a status update and mine immediately, bypassing counters.
    pub async fn seed_status(&self, fine_id: FineId, new_state: FineState, reason: &str) {
        let mut state = self.state.write().await;
        let hash = state.next_hash();
        state.mempool.push(PendingTx {
            hash,
            call: PendingCall::UpdateStatus {
                fine_id: fine_id.value(),
                new_state,
                reason: reason.to_string(),
            },
            revert: None,
        });
        self.mine(&mut state);
    }

    // ---- observation ----

    /// Transactions submitted through the port.
    pub fn submissions(&self) -> usize {
        self.counters.submissions.load(Ordering::SeqCst)
    }

    /// Typed read calls.
    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Typed `status_history` calls, including failed ones.
    pub fn typed_history_calls(&self) -> usize {
        self.counters.typed_history_calls.load(Ordering::SeqCst)
    }

    /// Raw calldata calls.
    pub fn raw_calls(&self) -> usize {
        self.counters.raw_calls.load(Ordering::SeqCst)
    }

    /// Every call that would have reached the network.
    pub fn network_calls(&self) -> usize {
        self.submissions()
            + self.counters.confirmations.load(Ordering::SeqCst)
            + self.reads()
            + self.raw_calls()
    }

    /// Current block height.
    pub async fn block_number(&self) -> u64 {
        self.state.read().await.block_number
    }

    fn ensure_online(&self) -> Result<()> {
        if self.knobs.offline.load(Ordering::SeqCst) {
            Err(MultaError::ledger_read("connection refused: ledger node unreachable"))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<()> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()
    }

    async fn submit(&self, call: PendingCall) -> Result<TxHash> {
        self.counters.submissions.fetch_add(1, Ordering::SeqCst);
        if self.knobs.offline.load(Ordering::SeqCst) {
            return Err(MultaError::ledger_write(
                "connection refused: ledger node unreachable",
            ));
        }
        let mut state = self.state.write().await;
        let hash = state.next_hash();
        let revert = state.revert_next.take();
        state.mempool.push(PendingTx { hash, call, revert });
        tracing::debug!(tx_hash = %hash, "memory ledger accepted transaction");
        Ok(hash)
    }

    fn mine(&self, state: &mut LedgerState) {
        if state.mempool.is_empty() {
            return;
        }
        state.block_number += 1;
        state.now += BLOCK_TIME_SECS;
        let block = state.block_number;
        let suppress = self.knobs.suppress_events.load(Ordering::SeqCst);
        let foreign = self.knobs.foreign_events.load(Ordering::SeqCst);

        for pending in std::mem::take(&mut state.mempool) {
            let outcome = match pending.revert {
                Some(reason) => Err(reason),
                None => state.execute(pending.call, block, self.contract, self.account),
            };
            let receipt = match outcome {
                Ok(logs) => {
                    let mut emitted = Vec::new();
                    if foreign {
                        emitted.push(fine_registered_log(
                            FOREIGN_CONTRACT,
                            FOREIGN_FINE_ID,
                            "ZZZ999",
                            "QmForeign",
                        ));
                    }
                    if !suppress {
                        emitted.extend(logs);
                    }
                    TxReceipt {
                        tx_hash: pending.hash,
                        block_number: block,
                        succeeded: true,
                        logs: emitted,
                        revert_reason: None,
                    }
                }
                Err(reason) => TxReceipt {
                    tx_hash: pending.hash,
                    block_number: block,
                    succeeded: false,
                    logs: Vec::new(),
                    revert_reason: Some(reason),
                },
            };
            state.receipts.insert(pending.hash, receipt);
        }
        tracing::debug!(block, "memory ledger mined block");
    }
}

#[async_trait]
impl FineRegistryEffects for MemoryLedger {
    fn contract_address(&self) -> LedgerAddress {
        self.contract
    }

    async fn submit_registration(&self, fine: &NewFine) -> Result<TxHash> {
        self.submit(PendingCall::Register(fine.clone())).await
    }

    async fn submit_status_update(
        &self,
        fine_id: FineId,
        new_state: FineState,
        reason: &str,
    ) -> Result<TxHash> {
        self.submit(PendingCall::UpdateStatus {
            fine_id: fine_id.value(),
            new_state,
            reason: reason.to_string(),
        })
        .await
    }

    async fn confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt> {
        self.counters.confirmations.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let mut held = self.hold.subscribe();
        loop {
            let waiting = *held.borrow_and_update();
            if !waiting || held.changed().await.is_err() {
                break;
            }
        }

        let mut state = self.state.write().await;
        if state.mempool.iter().any(|p| p.hash == *tx_hash) {
            self.mine(&mut state);
        }
        state
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| MultaError::ledger_read(format!("Unknown transaction {tx_hash}")))
    }

    async fn fine_count(&self) -> Result<u64> {
        self.read()?;
        Ok(self.state.read().await.fines.len() as u64)
    }

    async fn fine_details(&self, fine_id: FineId) -> Result<RawFine> {
        self.read()?;
        self.state.read().await.fine(fine_id.value()).map(RawFine::from)
    }

    async fn fines_details(&self, page: u64, page_size: u64) -> Result<Vec<RawFine>> {
        self.read()?;
        self.state.read().await.fines_page(page, page_size)
    }

    async fn fines_by_plate(&self, plate_number: &str) -> Result<Vec<u64>> {
        self.read()?;
        let state = self.state.read().await;
        Ok(state
            .fines
            .iter()
            .filter(|f| f.plate_number == plate_number)
            .map(|f| f.id.value())
            .collect())
    }

    async fn registration_details(&self, fine_id: FineId) -> Result<RegistrationDetails> {
        self.read()?;
        let state = self.state.read().await;
        state.fine(fine_id.value())?;
        usize::try_from(fine_id.value() - 1)
            .ok()
            .and_then(|i| state.registrations.get(i))
            .copied()
            .ok_or_else(|| MultaError::ledger_read("execution reverted: Fine does not exist"))
    }

    async fn status_history(
        &self,
        fine_id: FineId,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<StatusUpdate>, u64)> {
        self.counters.typed_history_calls.fetch_add(1, Ordering::SeqCst);
        self.read()?;
        if self.knobs.fail_typed_history.load(Ordering::SeqCst) {
            return Err(MultaError::ledger_read(
                "could not decode result data for getFineStatusHistory",
            ));
        }
        self.state
            .read()
            .await
            .history_page(fine_id.value(), page, page_size)
    }

    async fn contract_deployed(&self) -> Result<bool> {
        self.read()?;
        Ok(!self.knobs.undeployed.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl RawCallEffects for MemoryLedger {
    async fn raw_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>> {
        self.counters.raw_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let call = RegistryCall::decode(&calldata)
            .map_err(|e| MultaError::ledger_read(format!("execution reverted: {e}")))?;

        let state = self.state.read().await;
        match call {
            RegistryCall::FineCount => Ok(results::fine_count(state.fines.len() as u64)),
            RegistryCall::FineDetails { fine_id } => {
                let fine = state.fine(fine_id)?;
                Ok(results::fine_details(&RawFine::from(fine)))
            }
            RegistryCall::FinesDetails { page, page_size } => {
                Ok(results::fines_details(&state.fines_page(page, page_size)?))
            }
            RegistryCall::FinesByPlate { plate_number } => {
                let ids: Vec<u64> = state
                    .fines
                    .iter()
                    .filter(|f| f.plate_number == plate_number)
                    .map(|f| f.id.value())
                    .collect();
                Ok(results::fines_by_plate(&ids))
            }
            RegistryCall::RegistrationDetails { fine_id } => {
                state.fine(fine_id)?;
                let index = usize::try_from(fine_id - 1).unwrap_or(usize::MAX);
                let details = state.registrations.get(index).copied().unwrap_or(
                    RegistrationDetails {
                        block_number: 0,
                        timestamp: 0,
                    },
                );
                Ok(results::registration_details(&details))
            }
            RegistryCall::StatusHistory {
                fine_id,
                page,
                page_size,
            } => {
                let (updates, total) = state.history_page(fine_id, page, page_size)?;
                let raw: Vec<RawStatusUpdate> = updates.iter().map(RawStatusUpdate::from).collect();
                Ok(results::status_history(&raw, total))
            }
            RegistryCall::RegisterFine { .. } | RegistryCall::UpdateFineStatus { .. } => Err(
                MultaError::validation("eth_call cannot execute a state-changing function"),
            ),
        }
    }
}
