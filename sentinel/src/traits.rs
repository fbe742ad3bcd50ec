//! External collaborators consumed by the sentinel, and the notifier it
//! emits slash recommendations through. Each is a trait rather than a
//! concrete type: the sentinel only reads from the chain and gossip layer
//! and only emits intents, it never owns them.

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{ArchiveRoot, CommitteeAssignment, EpochNumber, SlashIntent, SlotNumber, ValidatorAddress},
};

/// L1 constants needed to translate between slots and epochs and to derive
/// the scheduler's tick cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct L1Constants {
    pub ethereum_slot_duration_ms: u64,
    pub slots_per_epoch: u32,
}

/// View over the rollup's epoch/committee machinery.
#[async_trait]
pub trait EpochCache: Send + Sync {
    /// Current epoch and slot, as observed right now.
    async fn epoch_and_slot_now(&self) -> Result<(EpochNumber, SlotNumber)>;

    /// Constants needed to compute epoch boundaries and the tick cadence.
    async fn l1_constants(&self) -> Result<L1Constants>;

    /// Committee assignment for `slot`, or `None` if the epoch has no
    /// committee recorded yet (not fatal — callers skip the slot).
    async fn committee(&self, slot: SlotNumber) -> Result<Option<CommitteeAssignment>>;

    /// Index into `committee` of the slot's proposer.
    fn compute_proposer_index(
        &self,
        slot: SlotNumber,
        epoch: EpochNumber,
        seed: [u8; 32],
        committee_size: usize,
    ) -> usize;

    /// `[fromSlot, toSlot]` inclusive slot range covered by `epoch`.
    fn slot_range_for_epoch(&self, epoch: EpochNumber, slots_per_epoch: u32) -> (SlotNumber, SlotNumber);

    /// Epoch containing `slot`.
    fn epoch_of(&self, slot: SlotNumber, slots_per_epoch: u32) -> EpochNumber {
        slot / slots_per_epoch as u64
    }
}

/// A block observed on the canonical L2 block stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedBlock {
    pub slot: SlotNumber,
    pub number: u64,
    pub archive: ArchiveRoot,
    /// Attestations carried by the block itself (signer → validator).
    pub attestations: Vec<ValidatorAddress>,
}

/// Events yielded by the block-stream subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockStreamEvent {
    BlocksAdded(Vec<ObservedBlock>),
    ChainProven { block: ObservedBlock },
    ChainPruned { to_number: u64 },
}

/// View over the canonical L2 block source.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn block_number(&self) -> Result<u64>;
    async fn l2_slot_number(&self) -> Result<SlotNumber>;
    async fn get_block(&self, number: u64) -> Result<Option<ObservedBlock>>;
    /// Latest tip `(hash, number)` known to the block source.
    async fn tip(&self) -> Result<([u8; 32], u64)>;
}

/// A single attestation as reported by the gossip attestation pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attestation {
    pub sender: ValidatorAddress,
}

/// View over the gossip attestation pool.
#[async_trait]
pub trait AttestationPool: Send + Sync {
    /// Attestations seen on gossip for `slot`, optionally filtered by
    /// archive root.
    async fn attestations_for_slot(
        &self,
        slot: SlotNumber,
        archive: Option<ArchiveRoot>,
    ) -> Result<Vec<Attestation>>;

    /// Latest L2 tip known to the attestation pool's own sync state.
    async fn l2_tip(&self) -> Result<([u8; 32], u64)>;
}

/// Injected at construction; receives batches of slash recommendations.
#[async_trait]
pub trait SlashNotifier: Send + Sync {
    async fn notify(&self, intents: Vec<SlashIntent>);
}
