//! On each `chain-proven` event, computes per-validator `missed / total`
//! attestation+proposal counts for the proven epoch, persists them, and
//! triggers the inactivity slasher.
//!
//! Preserved open caveat from the specification: this computes on *every*
//! `chain-proven` event, not only on events that finalize a complete
//! epoch. An implementer with an "epoch fully proven" signal available
//! should gate on it; this crate does not have that signal and computes
//! conservatively, as intended.

use std::sync::Arc;

use crate::{
    error::Result,
    history_store::HistoryPersistence,
    inactivity_slasher::InactivitySlasher,
    stats_reporter::{StatsQuery, StatsReporter},
    traits::{EpochCache, SlashNotifier},
    types::{ProvenEpochRecord, SlotNumber, ValidatorAddress},
};

pub struct ProvenPerformanceAnalyzer<E, S, N> {
    epoch_cache: Arc<E>,
    history: Arc<S>,
    slasher: InactivitySlasher<S, N>,
}

impl<E, S, N> ProvenPerformanceAnalyzer<E, S, N>
where
    E: EpochCache,
    S: HistoryPersistence,
    N: SlashNotifier,
{
    pub fn new(epoch_cache: Arc<E>, history: Arc<S>, slasher: InactivitySlasher<S, N>) -> Self {
        Self {
            epoch_cache,
            history,
            slasher,
        }
    }

    /// Handles a `chain-proven` event for the block at `slot`, in a chain
    /// whose L1 constants report `slots_per_epoch`, recording the window
    /// (in epochs) that proven-performance history should be retained for.
    #[tracing::instrument(skip(self))]
    pub async fn on_chain_proven(
        &self,
        slot: SlotNumber,
        slots_per_epoch: u32,
        window_epochs: u32,
    ) -> Result<()> {
        let epoch = self.epoch_cache.epoch_of(slot, slots_per_epoch);
        let (from_slot, to_slot) = self.epoch_cache.slot_range_for_epoch(epoch, slots_per_epoch);

        let Some(assignment) = self.epoch_cache.committee(from_slot).await? else {
            tracing::trace!(epoch, from_slot, "no committee for epoch start, skipping proven-performance analysis");
            return Ok(());
        };
        if assignment.committee.is_empty() {
            return Ok(());
        }

        // window_slots large enough to cover the requested range; the
        // retained history window is always at least one epoch's slots.
        let window_slots = to_slot.saturating_sub(from_slot) + 1;
        let reporter = StatsReporter::new(self.history.as_ref(), window_slots.max(slots_per_epoch as u64));
        let query = StatsQuery {
            from_slot: Some(from_slot),
            to_slot: Some(to_slot),
        };

        let mut results = Vec::with_capacity(assignment.committee.len());
        for &validator in &assignment.committee {
            let stats = reporter.validator_stats(validator, query)?.unwrap_or_default();
            let missed = stats.missed_attestations.count + stats.missed_proposals.count;
            let total = stats.missed_attestations.total + stats.missed_proposals.total;
            results.push((validator, ProvenEpochRecord { epoch, missed, total }));
        }

        self.history
            .update_proven_performance(epoch, &results, window_epochs)?;

        tracing::info!(epoch, validators = results.len(), "recorded proven-epoch performance");

        self.slasher.evaluate(epoch, &results).await;
        Ok(())
    }
}

/// Convenience alias matching the distilled spec's naming for the
/// per-validator `(missed, total)` result of one `computeStats` call.
pub type ProvenPerformanceResult = Vec<(ValidatorAddress, ProvenEpochRecord)>;
