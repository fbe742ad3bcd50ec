//! In-memory mapping from slot to `{block number, archive root, observed
//! attestors}` for recently mined blocks, pruned to the history window.
//! The authoritative source of "archive root at slot" consulted by the
//! `SlotObserver`.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    traits::ObservedBlock,
    types::{SlotIndexEntry, SlotNumber},
};

#[derive(Debug, Default)]
pub struct SlotIndex {
    entries: BTreeMap<SlotNumber, SlotIndexEntry>,
}

impl SlotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, slot: SlotNumber) -> Option<&SlotIndexEntry> {
        self.entries.get(&slot)
    }

    /// Records a newly observed block and evicts the oldest entries down to
    /// `window` (invariant 1: `|SlotIndex| <= historyWindow`).
    pub fn insert_block(&mut self, block: &ObservedBlock, window: u64) {
        let attestors: BTreeSet<_> = block.attestations.iter().copied().collect();
        self.entries.insert(
            block.slot,
            SlotIndexEntry {
                block_number: block.number,
                archive: block.archive,
                attestors,
            },
        );
        self.prune_to_window(window);
    }

    fn prune_to_window(&mut self, window: u64) {
        let window = window as usize;
        while self.entries.len() > window {
            if let Some(&oldest) = self.entries.keys().next() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}
