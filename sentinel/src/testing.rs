//! Deterministic in-memory fakes for the three external collaborator
//! traits, used by unit tests and the scenario tests in `tests/`. Not
//! compiled into the production crate.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    error::Result,
    traits::{Attestation, AttestationPool, BlockSource, EpochCache, L1Constants, ObservedBlock},
    types::{ArchiveRoot, CommitteeAssignment, EpochNumber, SlotNumber, ValidatorAddress},
};

pub fn committee_of(members: &[ValidatorAddress]) -> CommitteeAssignment {
    CommitteeAssignment {
        epoch: 0,
        seed: [0u8; 32],
        committee: members.to_vec(),
    }
}

#[derive(Default)]
pub struct FakeEpochCache {
    slots_per_epoch: u32,
    current_slot: Mutex<SlotNumber>,
    committees: Mutex<HashMap<SlotNumber, CommitteeAssignment>>,
    proposer_indices: Mutex<HashMap<SlotNumber, usize>>,
}

impl FakeEpochCache {
    pub fn new(slots_per_epoch: u32) -> Self {
        Self {
            slots_per_epoch,
            current_slot: Mutex::new(1_000),
            ..Default::default()
        }
    }

    pub fn set_current_slot(&mut self, slot: SlotNumber) {
        *self.current_slot.get_mut().unwrap() = slot;
    }

    pub fn set_committee(&mut self, slot: SlotNumber, assignment: CommitteeAssignment) {
        self.committees.get_mut().unwrap().insert(slot, assignment);
    }

    pub fn set_proposer_index(&mut self, slot: SlotNumber, index: usize) {
        self.proposer_indices.get_mut().unwrap().insert(slot, index);
    }
}

#[async_trait]
impl EpochCache for FakeEpochCache {
    async fn epoch_and_slot_now(&self) -> Result<(EpochNumber, SlotNumber)> {
        let slot = *self.current_slot.lock().unwrap();
        Ok((self.epoch_of(slot, self.slots_per_epoch.max(1)), slot))
    }

    async fn l1_constants(&self) -> Result<L1Constants> {
        Ok(L1Constants {
            ethereum_slot_duration_ms: 12_000,
            slots_per_epoch: self.slots_per_epoch.max(1),
        })
    }

    async fn committee(&self, slot: SlotNumber) -> Result<Option<CommitteeAssignment>> {
        Ok(self.committees.lock().unwrap().get(&slot).cloned())
    }

    fn compute_proposer_index(
        &self,
        slot: SlotNumber,
        _epoch: EpochNumber,
        _seed: [u8; 32],
        _committee_size: usize,
    ) -> usize {
        *self.proposer_indices.lock().unwrap().get(&slot).unwrap_or(&0)
    }

    fn slot_range_for_epoch(&self, epoch: EpochNumber, slots_per_epoch: u32) -> (SlotNumber, SlotNumber) {
        let from = epoch * slots_per_epoch as u64;
        (from, from + slots_per_epoch as u64 - 1)
    }
}

#[derive(Default)]
pub struct FakeBlockSource {
    head_slot: Mutex<SlotNumber>,
    blocks: Mutex<BTreeMap<u64, ObservedBlock>>,
    tip: Mutex<([u8; 32], u64)>,
}

impl FakeBlockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head_slot(&mut self, slot: SlotNumber) {
        *self.head_slot.get_mut().unwrap() = slot;
    }

    pub fn set_tip(&mut self, hash: [u8; 32], number: u64) {
        *self.tip.get_mut().unwrap() = (hash, number);
    }

    pub fn insert_block(
        &mut self,
        slot: SlotNumber,
        number: u64,
        archive: [u8; 32],
        attestations: Vec<ValidatorAddress>,
    ) {
        self.blocks.get_mut().unwrap().insert(
            number,
            ObservedBlock {
                slot,
                number,
                archive: ArchiveRoot(archive),
                attestations,
            },
        );
    }
}

#[async_trait]
impl BlockSource for FakeBlockSource {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.blocks.lock().unwrap().keys().next_back().copied().unwrap_or(0))
    }

    async fn l2_slot_number(&self) -> Result<SlotNumber> {
        Ok(*self.head_slot.lock().unwrap())
    }

    async fn get_block(&self, number: u64) -> Result<Option<ObservedBlock>> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn tip(&self) -> Result<([u8; 32], u64)> {
        Ok(*self.tip.lock().unwrap())
    }
}

#[derive(Default)]
pub struct FakeAttestationPool {
    attestations: Mutex<HashMap<SlotNumber, Vec<ValidatorAddress>>>,
    tip: Mutex<([u8; 32], u64)>,
}

impl FakeAttestationPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attestations(&mut self, slot: SlotNumber, senders: Vec<ValidatorAddress>) {
        self.attestations.get_mut().unwrap().insert(slot, senders);
    }

    pub fn set_tip(&mut self, hash: [u8; 32], number: u64) {
        *self.tip.get_mut().unwrap() = (hash, number);
    }
}

#[async_trait]
impl AttestationPool for FakeAttestationPool {
    async fn attestations_for_slot(
        &self,
        slot: SlotNumber,
        _archive: Option<ArchiveRoot>,
    ) -> Result<Vec<Attestation>> {
        Ok(self
            .attestations
            .lock()
            .unwrap()
            .get(&slot)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|sender| Attestation { sender })
            .collect())
    }

    async fn l2_tip(&self) -> Result<([u8; 32], u64)> {
        Ok(*self.tip.lock().unwrap())
    }
}
