//! Glue between the block-stream subscription and the two structures it
//! feeds: `TipTracker` (4.D) and `SlotIndex` (4.E). A `blocks-added` event
//! updates both; `chain-proven` and `chain-pruned` are passed through to
//! the tip tracker only (proven-epoch analysis is a separate consumer of
//! `chain-proven`, see `proven_performance`).

use std::sync::Mutex;

use crate::{
    error::Result,
    slot_index::SlotIndex,
    tip_tracker::TipTracker,
    traits::BlockStreamEvent,
};

/// Applies one block-stream event to the shared `SlotIndex` and
/// `TipTracker`. Errors from `TipTracker::apply` (`AlreadyApplied`,
/// `OutOfOrderEvent`) are surfaced to the caller, which logs and continues
/// per the error-handling design — they are never fatal to the stream.
pub fn apply_block_stream_event(
    slot_index: &Mutex<SlotIndex>,
    tip_tracker: &Mutex<TipTracker>,
    event: &BlockStreamEvent,
    window_slots: u64,
) -> Result<()> {
    if let BlockStreamEvent::BlocksAdded(blocks) = event {
        let mut index = slot_index.lock().expect("lock poisoned");
        for block in blocks {
            index.insert_block(block, window_slots);
        }
    }
    tip_tracker.lock().expect("lock poisoned").apply(event)?;
    Ok(())
}
