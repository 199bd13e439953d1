//! In-memory file ledger
//!
//! Behaves like the `storeFile` / `getFileCount` / `getFile` contract:
//! records are appended per `(contract, sender)`, stamped with the current
//! time, and never modified.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use privdock_envelope::Address;
use serde::{Deserialize, Serialize};

use crate::capability::{LedgerReader, LedgerWriter};
use crate::error::LedgerError;
use crate::mock_fhe::MockFhe;
use crate::record::{FileSubmission, LedgerRecord, TxReceipt};
use crate::unix_now;

/// Serializable state of a [`MemoryLedger`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub chain_id: u64,
    pub block_number: u64,
    pub files: Vec<ScopedFiles>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedFiles {
    pub contract: Address,
    pub owner: Address,
    pub records: Vec<LedgerRecord>,
}

pub struct MemoryLedger {
    chain_id: u64,
    block_number: AtomicU64,
    files: DashMap<(Address, Address), Vec<LedgerRecord>>,
    /// When set, submissions must carry a valid input proof
    fhe: Option<Arc<MockFhe>>,
    /// Next submit reverts after "sending"
    revert_next: AtomicBool,
    /// Reads fail with a transport error
    offline: AtomicBool,
}

impl MemoryLedger {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            block_number: AtomicU64::new(0),
            files: DashMap::new(),
            fhe: None,
            revert_next: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        }
    }

    /// Check input proofs against this FHE service on submit
    pub fn with_fhe(mut self, fhe: Arc<MockFhe>) -> Self {
        self.fhe = Some(fhe);
        self
    }

    /// Make the next submission revert instead of confirming
    pub fn revert_next_submit(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total number of stored records across all scopes
    pub fn total_records(&self) -> usize {
        self.files.iter().map(|e| e.value().len()).sum()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain_id: self.chain_id,
            block_number: self.block_number.load(Ordering::SeqCst),
            files: self
                .files
                .iter()
                .map(|e| ScopedFiles {
                    contract: e.key().0,
                    owner: e.key().1,
                    records: e.value().clone(),
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let ledger = Self::new(snapshot.chain_id);
        ledger
            .block_number
            .store(snapshot.block_number, Ordering::SeqCst);
        for scoped in snapshot.files {
            ledger
                .files
                .insert((scoped.contract, scoped.owner), scoped.records);
        }
        ledger
    }

    fn ensure_online(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn count(&self, contract: &Address, owner: &Address) -> Result<u64, LedgerError> {
        self.ensure_online()?;
        Ok(self
            .files
            .get(&(*contract, *owner))
            .map(|records| records.len() as u64)
            .unwrap_or(0))
    }

    async fn get(
        &self,
        contract: &Address,
        owner: &Address,
        index: u64,
    ) -> Result<LedgerRecord, LedgerError> {
        self.ensure_online()?;
        let records = self.files.get(&(*contract, *owner));
        let count = records.as_ref().map(|r| r.len() as u64).unwrap_or(0);

        records
            .and_then(|r| r.get(index as usize).cloned())
            .ok_or(LedgerError::IndexOutOfRange { index, count })
    }
}

#[async_trait]
impl LedgerWriter for MemoryLedger {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn submit(
        &self,
        contract: &Address,
        submission: FileSubmission,
    ) -> Result<TxReceipt, LedgerError> {
        self.ensure_online()?;

        if let Some(fhe) = &self.fhe {
            if !fhe.verify_input(
                contract,
                &submission.sender,
                &submission.identity_handle,
                &submission.proof,
            ) {
                return Err(LedgerError::Rejected("invalid input proof".into()));
            }
        }

        if self.revert_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Rejected("transaction reverted".into()));
        }

        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;

        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.chain_id.to_le_bytes());
        hasher.update(&block_number.to_le_bytes());
        hasher.update(contract.as_bytes());
        hasher.update(submission.sender.as_bytes());
        hasher.update(submission.envelope.as_bytes());
        let tx_hash = *hasher.finalize().as_bytes();

        let record = LedgerRecord {
            name: submission.name,
            envelope: submission.envelope,
            identity_handle: submission.identity_handle,
            timestamp: unix_now(),
        };
        self.files
            .entry((*contract, submission.sender))
            .or_default()
            .push(record);

        Ok(TxReceipt {
            tx_hash,
            block_number,
        })
    }
}
