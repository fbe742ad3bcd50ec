//! Persistent per-validator sliding-window time-series of per-slot
//! statuses, plus per-validator per-epoch proven-performance records.
//!
//! This module ships the in-memory implementation of the `HistoryStore`
//! contract. A crash-consistent, disk-backed implementation can satisfy the
//! same `HistoryPersistence` trait without touching the rest of the
//! sentinel; only the trait boundary and this in-memory instance are
//! required here.

use std::{
    collections::HashMap,
    sync::{Mutex, RwLock},
};

use crate::{
    error::{Result, SentinelError},
    types::{EpochNumber, ProvenEpochRecord, SlotNumber, ValidatorAddress, ValidatorHistory, ValidatorHistoryEntry},
};

/// Persisted-state contract: two independent keyspaces, both keyed by
/// validator address (`history:<addr>` and `proven:<addr>` in the wire
/// layout). Implementations must serialize writes per call and must not
/// let readers observe a partially written batch.
pub trait HistoryPersistence: Send + Sync {
    fn update_validators(&self, slot: SlotNumber, statuses: &[(ValidatorAddress, crate::types::PerSlotStatus)], window_slots: u64) -> Result<()>;
    fn history(&self, address: ValidatorAddress) -> Option<ValidatorHistory>;
    fn histories(&self) -> HashMap<ValidatorAddress, ValidatorHistory>;
    fn update_proven_performance(
        &self,
        epoch: EpochNumber,
        records: &[(ValidatorAddress, ProvenEpochRecord)],
        window_epochs: u32,
    ) -> Result<()>;
    fn proven_performance(&self, address: ValidatorAddress) -> Vec<ProvenEpochRecord>;
    fn history_length(&self) -> usize;
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    history: RwLock<HashMap<ValidatorAddress, ValidatorHistory>>,
    proven: RwLock<HashMap<ValidatorAddress, Vec<ProvenEpochRecord>>>,
    // Guards the read-modify-write sequence so concurrent batches never
    // interleave (per-slot updates are never interleaved with each other).
    write_lock: Mutex<()>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryPersistence for InMemoryHistoryStore {
    fn update_validators(
        &self,
        slot: SlotNumber,
        statuses: &[(ValidatorAddress, crate::types::PerSlotStatus)],
        window_slots: u64,
    ) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| SentinelError::StorageUnavailable(e.to_string()))?;
        let mut history = self
            .history
            .write()
            .map_err(|e| SentinelError::StorageUnavailable(e.to_string()))?;
        let floor = slot.saturating_sub(window_slots);
        for (address, status) in statuses {
            let entries = history.entry(*address).or_default();
            entries.push(ValidatorHistoryEntry { slot, status: *status });
            entries.retain(|entry| entry.slot > floor);
        }
        Ok(())
    }

    fn history(&self, address: ValidatorAddress) -> Option<ValidatorHistory> {
        self.history.read().ok()?.get(&address).cloned()
    }

    fn histories(&self) -> HashMap<ValidatorAddress, ValidatorHistory> {
        self.history
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn update_proven_performance(
        &self,
        epoch: EpochNumber,
        records: &[(ValidatorAddress, ProvenEpochRecord)],
        window_epochs: u32,
    ) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| SentinelError::StorageUnavailable(e.to_string()))?;
        let mut proven = self
            .proven
            .write()
            .map_err(|e| SentinelError::StorageUnavailable(e.to_string()))?;
        for (address, record) in records {
            let entries = proven.entry(*address).or_default();
            // Upsert: overwrite an existing record for the same epoch
            // (invariant 5/7: at most one record per (validator, epoch)).
            if let Some(existing) = entries.iter_mut().find(|r| r.epoch == epoch) {
                *existing = *record;
            } else {
                entries.push(*record);
            }
            let floor = epoch.saturating_sub(window_epochs as u64);
            entries.retain(|r| r.epoch > floor);
        }
        Ok(())
    }

    fn proven_performance(&self, address: ValidatorAddress) -> Vec<ProvenEpochRecord> {
        self.proven
            .read()
            .ok()
            .and_then(|guard| guard.get(&address).cloned())
            .unwrap_or_default()
    }

    fn history_length(&self) -> usize {
        self.history
            .read()
            .map(|guard| guard.values().map(|h| h.len()).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PerSlotStatus;

    fn addr(b: u8) -> ValidatorAddress {
        ValidatorAddress([b; 20])
    }

    #[test]
    fn update_validators_appends_and_trims_window() {
        let store = InMemoryHistoryStore::new();
        let a = addr(1);
        for slot in 0..10u64 {
            store
                .update_validators(slot, &[(a, PerSlotStatus::AttestationSent)], 4)
                .unwrap();
        }
        let history = store.history(a).unwrap();
        assert!(history.len() <= 5, "window retains at most slot-floor+1 entries: {history:?}");
        assert_eq!(history.last().unwrap().slot, 9);
    }

    #[test]
    fn proven_performance_overwrites_same_epoch_record() {
        let store = InMemoryHistoryStore::new();
        let a = addr(2);
        store
            .update_proven_performance(5, &[(a, ProvenEpochRecord { epoch: 5, missed: 1, total: 4 })], 10)
            .unwrap();
        store
            .update_proven_performance(5, &[(a, ProvenEpochRecord { epoch: 5, missed: 2, total: 4 })], 10)
            .unwrap();
        let records = store.proven_performance(a);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].missed, 2);
    }

    #[test]
    fn proven_performance_prunes_outside_window() {
        let store = InMemoryHistoryStore::new();
        let a = addr(3);
        for epoch in 0..10u64 {
            store
                .update_proven_performance(epoch, &[(a, ProvenEpochRecord { epoch, missed: 0, total: 1 })], 3)
                .unwrap();
        }
        let records = store.proven_performance(a);
        assert!(records.len() <= 4);
        assert!(records.iter().any(|r| r.epoch == 9));
        assert!(!records.iter().any(|r| r.epoch == 0));
    }

    #[test]
    fn histories_returns_all_validators() {
        let store = InMemoryHistoryStore::new();
        store
            .update_validators(1, &[(addr(1), PerSlotStatus::BlockMined), (addr(2), PerSlotStatus::AttestationSent)], 10)
            .unwrap();
        let all = store.histories();
        assert_eq!(all.len(), 2);
    }
}
