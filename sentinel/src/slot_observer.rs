//! The scheduler core. Wakes on a fixed cadence, determines readiness,
//! picks the target slot (two behind current), gathers committee,
//! proposer and attestors, classifies each committee member, and writes
//! the result into the `HistoryStore`.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{
    config::ConfigHandle,
    error::Result,
    history_store::HistoryPersistence,
    slot_index::SlotIndex,
    tip_tracker::TipTracker,
    traits::{AttestationPool, BlockSource, EpochCache},
    types::{EpochNumber, PerSlotStatus, SlotNumber, ValidatorAddress},
};

/// Nullable `lastProcessedSlot` / `initialSlot`, represented as a sum type
/// rather than a sentinel integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotCursor {
    #[default]
    Uninitialized,
    At(SlotNumber),
}

impl SlotCursor {
    pub fn slot(self) -> Option<SlotNumber> {
        match self {
            Self::Uninitialized => None,
            Self::At(s) => Some(s),
        }
    }
}

/// Why a tick declined to process a slot. Every variant is traced at a
/// level matching the error-handling taxonomy (precondition, not fatal).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotReadyReason {
    NotStarted,
    AlreadyProcessed,
    TargetAtOrBeforeInitialSlot,
    BlockSourceBehindTarget,
    TipTrackerUnsynced,
    TipMismatch,
}

pub struct SlotObserver<E, B, A, S> {
    epoch_cache: Arc<E>,
    block_source: Arc<B>,
    attestation_pool: Arc<A>,
    history: Arc<S>,
    slot_index: Arc<Mutex<SlotIndex>>,
    tip_tracker: Arc<Mutex<TipTracker>>,
    config: Arc<ConfigHandle>,
    initial_slot: Mutex<SlotCursor>,
    last_processed_slot: Mutex<SlotCursor>,
}

impl<E, B, A, S> SlotObserver<E, B, A, S>
where
    E: EpochCache,
    B: BlockSource,
    A: AttestationPool,
    S: HistoryPersistence,
{
    pub fn new(
        epoch_cache: Arc<E>,
        block_source: Arc<B>,
        attestation_pool: Arc<A>,
        history: Arc<S>,
        slot_index: Arc<Mutex<SlotIndex>>,
        tip_tracker: Arc<Mutex<TipTracker>>,
        config: Arc<ConfigHandle>,
    ) -> Self {
        Self {
            epoch_cache,
            block_source,
            attestation_pool,
            history,
            slot_index,
            tip_tracker,
            config,
            initial_slot: Mutex::new(SlotCursor::Uninitialized),
            last_processed_slot: Mutex::new(SlotCursor::Uninitialized),
        }
    }

    /// Marks `initialSlot` as the current slot, if not already set. Called
    /// once when the sentinel starts (invariant 5: no slot `<= initialSlot`
    /// is ever processed).
    pub async fn mark_started(&self) -> Result<()> {
        let mut initial = self.initial_slot.lock().expect("lock poisoned");
        if matches!(*initial, SlotCursor::Uninitialized) {
            let (_, current_slot) = self.epoch_cache.epoch_and_slot_now().await?;
            *initial = SlotCursor::At(current_slot);
        }
        Ok(())
    }

    /// Runs the periodic tick loop until `cancellation` fires. Every
    /// suspension point inside a tick honors cancellation; an in-flight
    /// tick interrupted mid-way is not retried — the next start
    /// re-synchronizes from `currentSlot`, not `lastProcessedSlot + 1`.
    pub async fn run(self: Arc<Self>, cancellation: CancellationToken) -> Result<()> {
        self.mark_started().await?;
        let l1 = self.epoch_cache.l1_constants().await?;
        let mut interval = tokio::time::interval(Duration::from_millis(l1.ethereum_slot_duration_ms / 4));
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "sentinel tick failed, retrying next cadence");
                    }
                }
            }
        }
    }

    /// One scheduler tick: synchronizes the tip, computes readiness, and
    /// processes the target slot if ready.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<()> {
        let (_, current_slot) = self.epoch_cache.epoch_and_slot_now().await?;
        self.sync_tip().await?;

        match self.readiness(current_slot).await? {
            Ok(target_slot) => self.process_slot(target_slot).await,
            Err(reason) => {
                tracing::trace!(?reason, current_slot, "slot not ready, skipping tick");
                Ok(())
            }
        }
    }

    async fn sync_tip(&self) -> Result<()> {
        let (hash, number) = self.block_source.tip().await?;
        self.tip_tracker
            .lock()
            .expect("lock poisoned")
            .sync_from_source(hash, number);
        Ok(())
    }

    /// Computes `targetSlot = currentSlot - 2` and checks every
    /// precondition named in the scheduler design. Returns `Ok(target)`
    /// when ready, `Err(reason)` otherwise.
    async fn readiness(&self, current_slot: SlotNumber) -> Result<std::result::Result<SlotNumber, NotReadyReason>> {
        let initial = match self.initial_slot.lock().expect("lock poisoned").slot() {
            Some(s) => s,
            None => return Ok(Err(NotReadyReason::NotStarted)),
        };

        if current_slot < 2 {
            return Ok(Err(NotReadyReason::TargetAtOrBeforeInitialSlot));
        }
        let target_slot = current_slot - 2;

        if target_slot <= initial {
            return Ok(Err(NotReadyReason::TargetAtOrBeforeInitialSlot));
        }

        if let SlotCursor::At(last) = *self.last_processed_slot.lock().expect("lock poisoned") {
            if last >= target_slot {
                return Ok(Err(NotReadyReason::AlreadyProcessed));
            }
        }

        let block_source_head = self.block_source.l2_slot_number().await?;
        if block_source_head < target_slot {
            return Ok(Err(NotReadyReason::BlockSourceBehindTarget));
        }

        // Consult the TipTracker (synced from the block source earlier this
        // tick, per `sync_tip`) rather than re-querying the block source
        // directly: §4.A specifies the tracked tip hash is what gates
        // readiness against the attestation pool's own reported tip.
        let Some(block_tip) = self.tip_tracker.lock().expect("lock poisoned").tip() else {
            return Ok(Err(NotReadyReason::TipTrackerUnsynced));
        };
        let (pool_tip_hash, _) = self.attestation_pool.l2_tip().await?;
        if block_tip.hash != pool_tip_hash {
            return Ok(Err(NotReadyReason::TipMismatch));
        }

        Ok(Ok(target_slot))
    }

    /// Processes one slot: resolves the committee and proposer, classifies
    /// every committee member's activity, and writes the result to
    /// `HistoryStore`. On success, advances `lastProcessedSlot`.
    #[tracing::instrument(skip(self))]
    pub async fn process_slot(&self, slot: SlotNumber) -> Result<()> {
        let Some(assignment) = self.epoch_cache.committee(slot).await? else {
            tracing::trace!(slot, "no committee for slot, skipping");
            self.advance_last_processed(slot);
            return Ok(());
        };
        if assignment.committee.is_empty() {
            tracing::trace!(slot, "empty committee, skipping");
            self.advance_last_processed(slot);
            return Ok(());
        }

        let proposer_index = self.epoch_cache.compute_proposer_index(
            slot,
            assignment.epoch,
            assignment.seed,
            assignment.committee.len(),
        );
        let Some(&proposer) = assignment.committee.get(proposer_index) else {
            tracing::error!(slot, proposer_index, "proposer index outside committee, skipping slot");
            return Ok(());
        };

        let statuses = self
            .classify_slot_activity(slot, proposer, &assignment.committee)
            .await?;

        let slots_per_epoch = self.epoch_cache.l1_constants().await?.slots_per_epoch;
        let window_slots = self.config.load().window_slots(slots_per_epoch);
        self.history.update_validators(slot, &statuses, window_slots)?;
        self.advance_last_processed(slot);
        Ok(())
    }

    fn advance_last_processed(&self, slot: SlotNumber) {
        *self.last_processed_slot.lock().expect("lock poisoned") = SlotCursor::At(slot);
    }

    /// `getSlotActivity`: resolves the block/gossip view of `slot` and
    /// classifies every committee member.
    async fn classify_slot_activity(
        &self,
        slot: SlotNumber,
        proposer: ValidatorAddress,
        committee: &[ValidatorAddress],
    ) -> Result<Vec<(ValidatorAddress, PerSlotStatus)>> {
        let block_entry = self.slot_index.lock().expect("lock poisoned").get(slot).cloned();

        let p2p_attestors = self
            .attestation_pool
            .attestations_for_slot(slot, block_entry.as_ref().map(|b| b.archive))
            .await?;

        let mut attestors: BTreeSet<ValidatorAddress> = p2p_attestors.into_iter().map(|a| a.sender).collect();
        if let Some(entry) = &block_entry {
            attestors.extend(entry.attestors.iter().copied());
        }
        attestors.remove(&proposer);

        let block_status = if block_entry.is_some() {
            BlockClassification::Mined
        } else if !attestors.is_empty() {
            BlockClassification::Proposed
        } else {
            BlockClassification::Missed
        };

        let mut statuses = Vec::with_capacity(committee.len());
        for &validator in committee {
            let status = if validator == proposer {
                Some(block_status.proposer_status())
            } else if attestors.contains(&validator) {
                Some(PerSlotStatus::AttestationSent)
            } else if block_status != BlockClassification::Missed {
                Some(PerSlotStatus::AttestationMissed)
            } else {
                // Invariant 4: no committee member is credited with
                // attestation-missed when the proposer's block was missed.
                None
            };
            if let Some(status) = status {
                statuses.push((validator, status));
            }
        }
        Ok(statuses)
    }

    pub fn last_processed_slot(&self) -> SlotCursor {
        *self.last_processed_slot.lock().expect("lock poisoned")
    }

    pub fn initial_slot(&self) -> SlotCursor {
        *self.initial_slot.lock().expect("lock poisoned")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockClassification {
    Mined,
    Proposed,
    Missed,
}

impl BlockClassification {
    fn proposer_status(self) -> PerSlotStatus {
        match self {
            Self::Mined => PerSlotStatus::BlockMined,
            Self::Proposed => PerSlotStatus::BlockProposed,
            Self::Missed => PerSlotStatus::BlockMissed,
        }
    }
}

/// Epoch containing `slot`, exposed for callers (e.g. the proven-performance
/// analyzer) that need it outside of an `EpochCache` instance.
pub fn epoch_of(slot: SlotNumber, slots_per_epoch: u32) -> EpochNumber {
    slot / slots_per_epoch as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SentinelConfig,
        testing::{committee_of, FakeAttestationPool, FakeBlockSource, FakeEpochCache},
    };
    use crate::history_store::InMemoryHistoryStore;

    fn addr(b: u8) -> ValidatorAddress {
        ValidatorAddress([b; 20])
    }

    fn build_observer(
        epoch_cache: FakeEpochCache,
        block_source: FakeBlockSource,
        pool: FakeAttestationPool,
    ) -> SlotObserver<FakeEpochCache, FakeBlockSource, FakeAttestationPool, InMemoryHistoryStore> {
        SlotObserver::new(
            Arc::new(epoch_cache),
            Arc::new(block_source),
            Arc::new(pool),
            Arc::new(InMemoryHistoryStore::new()),
            Arc::new(Mutex::new(SlotIndex::new())),
            Arc::new(Mutex::new(TipTracker::new())),
            Arc::new(ConfigHandle::new(SentinelConfig::default()).unwrap()),
        )
    }

    // Scenario S1: committee of 3, happy attestation path.
    #[tokio::test]
    async fn s1_happy_attestation_path() {
        let a = addr(0xA);
        let b = addr(0xB);
        let c = addr(0xC);
        let committee = committee_of(&[a, b, c]);

        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_current_slot(12);
        epoch_cache.set_committee(10, committee);
        epoch_cache.set_proposer_index(10, 0); // a is proposer

        let mut block_source = FakeBlockSource::new();
        block_source.set_head_slot(10);
        block_source.set_tip([9u8; 32], 10);

        let mut pool = FakeAttestationPool::new();
        pool.set_tip([9u8; 32], 10);
        pool.set_attestations(10, vec![c]);

        let observer = build_observer(epoch_cache, block_source, pool);
        observer.slot_index.lock().unwrap().insert_block(
            &crate::traits::ObservedBlock {
                slot: 10,
                number: 10,
                archive: crate::types::ArchiveRoot([1u8; 32]),
                attestations: vec![b],
            },
            1000,
        );
        observer.mark_started().await.unwrap();
        // initial_slot was captured as 12 in mark_started via epoch_cache;
        // force it below the target for this scenario.
        *observer.initial_slot.lock().unwrap() = SlotCursor::At(5);

        observer.process_slot(10).await.unwrap();

        let history = observer.history.histories();
        assert_eq!(history[&a][0].status, PerSlotStatus::BlockMined);
        assert_eq!(history[&b][0].status, PerSlotStatus::AttestationSent);
        assert_eq!(history[&c][0].status, PerSlotStatus::AttestationSent);
    }

    // Scenario S2: missed proposal, no block and no gossip.
    #[tokio::test]
    async fn s2_missed_proposal() {
        let a = addr(0xA);
        let b = addr(0xB);
        let c = addr(0xC);
        let committee = committee_of(&[a, b, c]);

        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_committee(20, committee);
        epoch_cache.set_proposer_index(20, 1); // b is proposer

        let block_source = FakeBlockSource::new();
        let pool = FakeAttestationPool::new();

        let observer = build_observer(epoch_cache, block_source, pool);
        observer.process_slot(20).await.unwrap();

        let history = observer.history.histories();
        assert_eq!(history[&b][0].status, PerSlotStatus::BlockMissed);
        assert!(!history.contains_key(&a));
        assert!(!history.contains_key(&c));
    }

    // Scenario S3: proposal seen in gossip only.
    #[tokio::test]
    async fn s3_gossip_only_proposal() {
        let a = addr(0xA);
        let b = addr(0xB);
        let c = addr(0xC);
        let committee = committee_of(&[a, b, c]);

        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_committee(30, committee);
        epoch_cache.set_proposer_index(30, 1); // b is proposer

        let block_source = FakeBlockSource::new();
        let mut pool = FakeAttestationPool::new();
        pool.set_attestations(30, vec![a, c]);

        let observer = build_observer(epoch_cache, block_source, pool);
        observer.process_slot(30).await.unwrap();

        let history = observer.history.histories();
        assert_eq!(history[&b][0].status, PerSlotStatus::BlockProposed);
        assert_eq!(history[&a][0].status, PerSlotStatus::AttestationSent);
        assert_eq!(history[&c][0].status, PerSlotStatus::AttestationSent);
    }

    // Scenario S4: partial attestation with mined block.
    #[tokio::test]
    async fn s4_partial_attestation_with_mined_block() {
        let a = addr(0xA);
        let b = addr(0xB);
        let c = addr(0xC);
        let d = addr(0xD);
        let committee = committee_of(&[a, b, c, d]);

        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_committee(40, committee);
        epoch_cache.set_proposer_index(40, 2); // c is proposer

        let block_source = FakeBlockSource::new();
        let pool = FakeAttestationPool::new();

        let observer = build_observer(epoch_cache, block_source, pool);
        observer.slot_index.lock().unwrap().insert_block(
            &crate::traits::ObservedBlock {
                slot: 40,
                number: 40,
                archive: crate::types::ArchiveRoot([2u8; 32]),
                attestations: vec![a],
            },
            1000,
        );
        observer.process_slot(40).await.unwrap();

        let history = observer.history.histories();
        assert_eq!(history[&c][0].status, PerSlotStatus::BlockMined);
        assert_eq!(history[&a][0].status, PerSlotStatus::AttestationSent);
        assert_eq!(history[&b][0].status, PerSlotStatus::AttestationMissed);
        assert_eq!(history[&d][0].status, PerSlotStatus::AttestationMissed);
    }

    #[tokio::test]
    async fn readiness_rejects_target_before_initial_slot() {
        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_current_slot(10);
        let observer = build_observer(epoch_cache, FakeBlockSource::new(), FakeAttestationPool::new());
        *observer.initial_slot.lock().unwrap() = SlotCursor::At(9);
        let result = observer.readiness(10).await.unwrap();
        assert_eq!(result, Err(NotReadyReason::TargetAtOrBeforeInitialSlot));
    }

    #[tokio::test]
    async fn readiness_rejects_tip_mismatch() {
        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_current_slot(10);
        let mut block_source = FakeBlockSource::new();
        block_source.set_head_slot(8);
        block_source.set_tip([1u8; 32], 8);
        let mut pool = FakeAttestationPool::new();
        pool.set_tip([2u8; 32], 8);

        let observer = build_observer(epoch_cache, block_source, pool);
        *observer.initial_slot.lock().unwrap() = SlotCursor::At(0);
        observer.sync_tip().await.unwrap();
        let result = observer.readiness(10).await.unwrap();
        assert_eq!(result, Err(NotReadyReason::TipMismatch));
    }

    #[tokio::test]
    async fn readiness_accepts_when_all_preconditions_met() {
        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_current_slot(10);
        let mut block_source = FakeBlockSource::new();
        block_source.set_head_slot(8);
        block_source.set_tip([1u8; 32], 8);
        let mut pool = FakeAttestationPool::new();
        pool.set_tip([1u8; 32], 8);

        let observer = build_observer(epoch_cache, block_source, pool);
        *observer.initial_slot.lock().unwrap() = SlotCursor::At(0);
        observer.sync_tip().await.unwrap();
        let result = observer.readiness(10).await.unwrap();
        assert_eq!(result, Ok(8));
    }

    #[tokio::test]
    async fn readiness_rejects_unsynced_tip_tracker() {
        crate::test_support::init_tracing();
        let mut epoch_cache = FakeEpochCache::new(4);
        epoch_cache.set_current_slot(10);
        let mut block_source = FakeBlockSource::new();
        block_source.set_head_slot(8);
        let observer = build_observer(epoch_cache, block_source, FakeAttestationPool::new());
        *observer.initial_slot.lock().unwrap() = SlotCursor::At(0);
        // sync_tip() was never called this tick: the tracker has nothing to
        // compare against yet.
        let result = observer.readiness(10).await.unwrap();
        assert_eq!(result, Err(NotReadyReason::TipTrackerUnsynced));
    }
}
