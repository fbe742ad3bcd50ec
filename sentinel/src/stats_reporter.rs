//! Synthesizes bounded-window statistics (streaks, rates, last-proposal,
//! last-attestation) from the `HistoryStore` for one validator or all.

use std::collections::HashMap;

use crate::{
    error::{Result, SentinelError},
    history_store::HistoryPersistence,
    types::{Duty, PerSlotStatus, SlotNumber, ValidatorAddress, ValidatorHistory},
};

/// The most recent entry matching a duty, if any occurred in the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastDutyEntry {
    pub slot: SlotNumber,
    pub status: PerSlotStatus,
}

/// Streak/rate statistics over one duty class (proposals or attestations),
/// filtered for the "missed" variant of that class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MissedDutyStats {
    /// Length of the longest suffix (most recent entries) of the
    /// duty-class history where every entry is a miss.
    pub current_streak: u64,
    pub count: u64,
    pub total: u64,
}

impl MissedDutyStats {
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.count as f64 / self.total as f64)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SingleValidatorStats {
    pub last_proposal: Option<LastDutyEntry>,
    pub last_attestation: Option<LastDutyEntry>,
    pub total_slots: usize,
    pub missed_proposals: MissedDutyStats,
    pub missed_attestations: MissedDutyStats,
}

pub type ValidatorsStats = HashMap<ValidatorAddress, SingleValidatorStats>;

#[derive(Clone, Copy, Debug, Default)]
pub struct StatsQuery {
    pub from_slot: Option<SlotNumber>,
    pub to_slot: Option<SlotNumber>,
}

pub struct StatsReporter<'a, S: HistoryPersistence> {
    store: &'a S,
    /// Retained history window, in slots — the bound `StatsQuery` ranges
    /// are checked against.
    window_slots: u64,
}

impl<'a, S: HistoryPersistence> StatsReporter<'a, S> {
    pub fn new(store: &'a S, window_slots: u64) -> Self {
        Self { store, window_slots }
    }

    pub fn validator_stats(
        &self,
        address: ValidatorAddress,
        query: StatsQuery,
    ) -> Result<Option<SingleValidatorStats>> {
        self.check_range(query)?;
        let Some(history) = self.store.history(address) else {
            return Ok(None);
        };
        Ok(Some(compute_stats(&history, query)))
    }

    pub fn all_validators_stats(&self, query: StatsQuery) -> Result<ValidatorsStats> {
        self.check_range(query)?;
        Ok(self
            .store
            .histories()
            .into_iter()
            .map(|(address, history)| (address, compute_stats(&history, query)))
            .collect())
    }

    fn check_range(&self, query: StatsQuery) -> Result<()> {
        if let (Some(from), Some(to)) = (query.from_slot, query.to_slot) {
            if to.saturating_sub(from) > self.window_slots {
                return Err(SentinelError::RangeExceedsWindow {
                    from,
                    to,
                    window: self.window_slots,
                });
            }
        }
        Ok(())
    }
}

fn in_range(slot: SlotNumber, query: StatsQuery) -> bool {
    let above_from = match query.from_slot {
        Some(from) => slot >= from,
        None => true,
    };
    let below_to = match query.to_slot {
        Some(to) => slot <= to,
        None => true,
    };
    above_from && below_to
}

fn compute_stats(history: &ValidatorHistory, query: StatsQuery) -> SingleValidatorStats {
    let windowed: Vec<_> = history.iter().filter(|e| in_range(e.slot, query)).collect();

    let last_proposal = windowed
        .iter()
        .rev()
        .find(|e| matches!(e.status, PerSlotStatus::BlockMined | PerSlotStatus::BlockProposed))
        .map(|e| LastDutyEntry { slot: e.slot, status: e.status });

    let last_attestation = windowed
        .iter()
        .rev()
        .find(|e| matches!(e.status, PerSlotStatus::AttestationSent))
        .map(|e| LastDutyEntry { slot: e.slot, status: e.status });

    SingleValidatorStats {
        last_proposal,
        last_attestation,
        total_slots: windowed.len(),
        missed_proposals: missed_duty_stats(&windowed, Duty::Proposal),
        missed_attestations: missed_duty_stats(&windowed, Duty::Attestation),
    }
}

fn missed_duty_stats(
    windowed: &[&crate::types::ValidatorHistoryEntry],
    duty: Duty,
) -> MissedDutyStats {
    let eligible: Vec<_> = windowed.iter().filter(|e| e.status.duty() == duty).collect();
    let total = eligible.len() as u64;
    let count = eligible.iter().filter(|e| e.status.is_missed()).count() as u64;
    let current_streak = eligible
        .iter()
        .rev()
        .take_while(|e| e.status.is_missed())
        .count() as u64;
    MissedDutyStats {
        current_streak,
        count,
        total,
    }
}
