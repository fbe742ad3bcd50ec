//! Tracks the head of the local chain, fed by the block-stream handler.
//! Consulted by the `SlotObserver` readiness gate to confirm the
//! attestation pool is synced up to the block source (see `slot_observer`).

use crate::{error::SentinelError, traits::BlockStreamEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tip {
    pub hash: [u8; 32],
    pub number: u64,
}

#[derive(Debug, Default)]
pub struct TipTracker {
    tip: Option<Tip>,
    last_applied_number: Option<u64>,
}

impl TipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tip(&self) -> Option<Tip> {
        self.tip
    }

    /// Pull-style sync against the block source's own tip query, used by
    /// the `SlotObserver` at the start of every tick. Unlike `apply`, this
    /// does not enforce sequencing — it simply records the latest
    /// observation, since the block source is the authority being polled.
    pub fn sync_from_source(&mut self, hash: [u8; 32], number: u64) {
        let should_update = match self.tip {
            Some(t) => number >= t.number,
            None => true,
        };
        if should_update {
            self.tip = Some(Tip { hash, number });
        }
    }

    /// Applies a block-stream event. Returns `AlreadyApplied` if the event
    /// refers to a block number at or below the last applied one, and
    /// `OutOfOrderEvent` if it skips ahead of what the tracker expects.
    pub fn apply(&mut self, event: &BlockStreamEvent) -> Result<(), SentinelError> {
        match event {
            BlockStreamEvent::BlocksAdded(blocks) => {
                for block in blocks {
                    self.apply_block(block.number, block.archive.0)?;
                }
                Ok(())
            }
            BlockStreamEvent::ChainProven { .. } | BlockStreamEvent::ChainPruned { .. } => Ok(()),
        }
    }

    fn apply_block(&mut self, number: u64, hash: [u8; 32]) -> Result<(), SentinelError> {
        if let Some(last) = self.last_applied_number {
            if number <= last {
                return Err(SentinelError::AlreadyApplied);
            }
            if number > last + 1 {
                return Err(SentinelError::OutOfOrderEvent);
            }
        }
        self.last_applied_number = Some(number);
        self.tip = Some(Tip { hash, number });
        Ok(())
    }
}
