//! Ledger View
//!
//! The owner's records for one contract, each with its own reveal slot.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  LedgerView                                                   │
//! │                                                               │
//! │   current ──▶ Arc<Snapshot> (owner, contract)                 │
//! │                 ├── slot 0: record + watch<RevealState>       │
//! │                 ├── slot 1: record + watch<RevealState>       │
//! │                 └── tasks:  index -> AbortHandle              │
//! │                                                               │
//! │   load()    builds a new snapshot, swaps it in, retires the   │
//! │             old one (in-flight reveals aborted)               │
//! │   reveal(i) Hidden/Revealed/Failed -> Revealing, spawns one   │
//! │             task that publishes into slot i only              │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! A reveal task holds the snapshot it was started on, so once a reload
//! has swapped snapshots its result can only land in the retired one.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::try_join_all;
use privdock_envelope::Address;
use privdock_ledger::{Handle, LedgerError, LedgerReader, LedgerRecord};
use tokio::sync::{RwLock, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::DockError;
use crate::reveal::{RevealState, Revealer};

/// Owner and contract a view was loaded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewScope {
    pub owner: Address,
    pub contract: Address,
}

/// One record with its current reveal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub index: usize,
    pub record: LedgerRecord,
    pub state: RevealState,
}

/// Outcome of asking for a reveal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealTrigger {
    /// A new attempt was started for this handle
    Started(Handle),
    /// An attempt for this slot is already running; it will publish the result
    InFlight,
}

struct Slot {
    record: LedgerRecord,
    state: watch::Sender<RevealState>,
}

struct Snapshot {
    scope: Option<ViewScope>,
    slots: Vec<Slot>,
    tasks: DashMap<usize, AbortHandle>,
}

impl Snapshot {
    fn new(scope: Option<ViewScope>, records: Vec<LedgerRecord>) -> Self {
        let slots = records
            .into_iter()
            .map(|record| Slot {
                record,
                state: watch::Sender::new(RevealState::Hidden),
            })
            .collect();
        Self {
            scope,
            slots,
            tasks: DashMap::new(),
        }
    }

    fn slot(&self, index: usize) -> Result<&Slot, DockError> {
        self.slots.get(index).ok_or_else(|| {
            DockError::PreconditionFailed(format!(
                "index {} out of range (count {})",
                index,
                self.slots.len()
            ))
        })
    }

    fn entry(&self, index: usize, slot: &Slot) -> LedgerEntry {
        LedgerEntry {
            index,
            record: slot.record.clone(),
            state: slot.state.borrow().clone(),
        }
    }

    /// Abort in-flight reveals and release anyone waiting on them
    fn retire(&self) {
        let aborted: Vec<usize> = self
            .tasks
            .iter()
            .map(|task| {
                task.value().abort();
                *task.key()
            })
            .collect();
        self.tasks.clear();

        for slot in &self.slots {
            slot.state.send_if_modified(|state| {
                if state.is_revealing() {
                    *state = RevealState::Hidden;
                    true
                } else {
                    false
                }
            });
        }

        if !aborted.is_empty() {
            debug!("Aborted {} in-flight reveal(s) of a retired view", aborted.len());
        }
    }
}

pub struct LedgerView {
    reader: Arc<dyn LedgerReader>,
    revealer: Arc<Revealer>,
    current: RwLock<Arc<Snapshot>>,
}

impl LedgerView {
    pub fn new(reader: Arc<dyn LedgerReader>, revealer: Arc<Revealer>) -> Self {
        Self {
            reader,
            revealer,
            current: RwLock::new(Arc::new(Snapshot::new(None, Vec::new()))),
        }
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    async fn replace(&self, next: Snapshot) {
        let previous = {
            let mut current = self.current.write().await;
            std::mem::replace(&mut *current, Arc::new(next))
        };
        previous.retire();
    }

    /// Fetch the owner's records and replace the view with them, all
    /// `Hidden`. On error the previous view is kept untouched.
    pub async fn load(&self, owner: Address, contract: Address) -> Result<usize, DockError> {
        let count = self
            .reader
            .count(&contract, &owner)
            .await
            .map_err(fetch_error)?;

        let records = try_join_all(
            (0..count).map(|index| self.reader.get(&contract, &owner, index)),
        )
        .await
        .map_err(fetch_error)?;

        let loaded = records.len();
        self.replace(Snapshot::new(Some(ViewScope { owner, contract }), records))
            .await;
        info!("Loaded {} record(s) for {} on {}", loaded, owner, contract);
        Ok(loaded)
    }

    /// Empty the view, e.g. when the wallet disconnects
    pub async fn clear(&self) {
        self.replace(Snapshot::new(None, Vec::new())).await;
    }

    pub async fn scope(&self) -> Option<ViewScope> {
        self.snapshot().await.scope
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, index: usize) -> Result<LedgerEntry, DockError> {
        let snapshot = self.snapshot().await;
        let slot = snapshot.slot(index)?;
        Ok(snapshot.entry(index, slot))
    }

    pub async fn entries(&self) -> Vec<LedgerEntry> {
        let snapshot = self.snapshot().await;
        snapshot
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| snapshot.entry(index, slot))
            .collect()
    }

    /// Watch one slot's state
    pub async fn subscribe(&self, index: usize) -> Result<watch::Receiver<RevealState>, DockError> {
        Ok(self.snapshot().await.slot(index)?.state.subscribe())
    }

    /// Start revealing one record.
    ///
    /// A slot that is already `Revealing` is left alone and `InFlight` is
    /// returned; the running attempt publishes the result.
    pub async fn reveal(&self, index: usize) -> Result<RevealTrigger, DockError> {
        let snapshot = self.snapshot().await;
        let slot = snapshot.slot(index)?;
        let Some(scope) = snapshot.scope else {
            return Err(DockError::precondition("No ledger loaded."));
        };

        let started = slot.state.send_if_modified(|state| {
            if state.is_revealing() {
                false
            } else {
                *state = RevealState::Revealing;
                true
            }
        });
        if !started {
            debug!("Reveal of index {} already in flight", index);
            return Ok(RevealTrigger::InFlight);
        }

        let handle = slot.record.identity_handle.clone();
        info!("Revealing index {} ({})", index, handle.short());

        let revealer = self.revealer.clone();
        let task_snapshot = snapshot.clone();
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            // Cleanup below must run after the handle is in the map
            let _ = registered_rx.await;
            let slot = &task_snapshot.slots[index];
            let state = revealer.reveal(&slot.record, &scope.contract).await;
            match &state {
                RevealState::Revealed { .. } => info!("Index {} revealed", index),
                RevealState::Failed { kind, .. } => warn!("Index {} failed: {}", index, kind),
                _ => {}
            }
            slot.state.send_replace(state);

            // A newer attempt may already own this index
            let own = tokio::task::id();
            task_snapshot
                .tasks
                .remove_if(&index, |_, task| task.id() == own);
        });
        snapshot.tasks.insert(index, task.abort_handle());
        let _ = registered_tx.send(());

        Ok(RevealTrigger::Started(handle))
    }

    /// Trigger a reveal on every slot
    pub async fn reveal_all(&self) -> Vec<(usize, RevealTrigger)> {
        let mut triggers = Vec::new();
        for index in 0..self.len().await {
            match self.reveal(index).await {
                Ok(trigger) => triggers.push((index, trigger)),
                // The view was reloaded underneath us
                Err(e) => {
                    debug!("Stopped revealing at index {}: {}", index, e);
                    break;
                }
            }
        }
        triggers
    }

    /// Wait until slot `index` is no longer `Revealing` and return its state
    pub async fn wait(&self, index: usize) -> Result<RevealState, DockError> {
        let snapshot = self.snapshot().await;
        let mut receiver = snapshot.slot(index)?.state.subscribe();
        let state = receiver
            .wait_for(|state| !state.is_revealing())
            .await
            .map_err(|_| DockError::precondition("The ledger view was reloaded."))?
            .clone();
        Ok(state)
    }
}

fn fetch_error(e: LedgerError) -> DockError {
    warn!("Ledger fetch failed: {}", e);
    DockError::FetchError(e.to_string())
}
