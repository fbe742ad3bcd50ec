//! Reads proven-performance history and emits "want-to-slash" events for
//! validators meeting the consecutive-inactive-epoch criterion.
//!
//! Idempotent by construction: re-invocation for the same epoch re-derives
//! and re-emits the same intents from the same stored records; de-duping
//! deliveries on `(offense, epoch, validator)` is the consumer's job.

use std::sync::Arc;

use crate::{
    config::ConfigHandle,
    history_store::HistoryPersistence,
    traits::SlashNotifier,
    types::{EpochNumber, OffenseType, ProvenEpochRecord, SlashIntent, ValidatorAddress},
};

pub struct InactivitySlasher<S, N> {
    history: Arc<S>,
    notifier: Arc<N>,
    config: Arc<ConfigHandle>,
}

impl<S, N> InactivitySlasher<S, N>
where
    S: HistoryPersistence,
    N: SlashNotifier,
{
    pub fn new(history: Arc<S>, notifier: Arc<N>, config: Arc<ConfigHandle>) -> Self {
        Self {
            history,
            notifier,
            config,
        }
    }

    /// Evaluates the proven-performance results just recorded for `epoch`
    /// and emits a batched slash event for every validator meeting the
    /// consecutive-inactive-epoch criterion.
    #[tracing::instrument(skip(self, results))]
    pub async fn evaluate(&self, epoch: EpochNumber, results: &[(ValidatorAddress, ProvenEpochRecord)]) {
        let config = self.config.load();
        if !config.inactivity_slashing_enabled() {
            return;
        }

        let target = config.slash_inactivity_target_percentage;
        let threshold = config.slash_inactivity_consecutive_epoch_threshold;

        let mut intents = Vec::new();
        for (validator, record) in results {
            if !meets_target(record, target) {
                continue;
            }
            if threshold > 1 && !self.has_consecutive_prior_history(*validator, epoch, target, threshold) {
                continue;
            }
            intents.push(SlashIntent {
                validator: *validator,
                amount: config.slash_inactivity_penalty,
                offense_type: OffenseType::Inactivity,
                epoch_or_slot: epoch,
            });
        }

        if !intents.is_empty() {
            tracing::info!(epoch, count = intents.len(), "emitting inactivity slash recommendations");
            self.notifier.notify(intents).await;
        }
    }

    /// Requires at least `threshold - 1` consecutive proven epochs strictly
    /// before `epoch`, all meeting the target, matching the spec's
    /// "sort descending, take the first N-1, require all meet threshold"
    /// rule.
    fn has_consecutive_prior_history(
        &self,
        validator: ValidatorAddress,
        epoch: EpochNumber,
        target: f64,
        threshold: u32,
    ) -> bool {
        let mut history = self.history.proven_performance(validator);
        history.retain(|r| r.epoch < epoch);
        history.sort_by(|a, b| b.epoch.cmp(&a.epoch));

        let needed = (threshold - 1) as usize;
        if history.len() < needed {
            return false;
        }
        history[..needed].iter().all(|r| meets_target(r, target))
    }
}

fn meets_target(record: &ProvenEpochRecord, target: f64) -> bool {
    record.rate().map(|rate| rate >= target).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SentinelConfig, history_store::InMemoryHistoryStore};
    use std::sync::Mutex as StdMutex;

    struct RecordingNotifier {
        received: StdMutex<Vec<SlashIntent>>,
    }

    #[async_trait::async_trait]
    impl SlashNotifier for RecordingNotifier {
        async fn notify(&self, intents: Vec<SlashIntent>) {
            self.received.lock().unwrap().extend(intents);
        }
    }

    fn addr(b: u8) -> ValidatorAddress {
        ValidatorAddress([b; 20])
    }

    fn config(threshold: u32, target: f64, penalty: u64) -> Arc<ConfigHandle> {
        Arc::new(
            ConfigHandle::new(SentinelConfig {
                slash_inactivity_consecutive_epoch_threshold: threshold,
                slash_inactivity_target_percentage: target,
                slash_inactivity_penalty: primitive_types::U256::from(penalty),
                historic_proven_performance_length_in_epochs: threshold.max(4),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    // Scenario S5: inactivity slash, threshold met.
    #[tokio::test]
    async fn s5_threshold_met_emits_slash() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let v = addr(1);
        history
            .update_proven_performance(5, &[(v, ProvenEpochRecord { epoch: 5, missed: 5, total: 6 })], 10)
            .unwrap();
        history
            .update_proven_performance(6, &[(v, ProvenEpochRecord { epoch: 6, missed: 4, total: 5 })], 10)
            .unwrap();
        let notifier = Arc::new(RecordingNotifier {
            received: StdMutex::new(vec![]),
        });
        let slasher = InactivitySlasher::new(history.clone(), notifier.clone(), config(3, 0.5, 100));

        let epoch7 = ProvenEpochRecord { epoch: 7, missed: 6, total: 6 };
        history.update_proven_performance(7, &[(v, epoch7)], 10).unwrap();
        slasher.evaluate(7, &[(v, epoch7)]).await;

        let received = notifier.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].validator, v);
        assert_eq!(received[0].epoch_or_slot, 7);
        assert_eq!(received[0].amount, primitive_types::U256::from(100));
    }

    // Scenario S6: inactivity slash, threshold not met (middle epoch below
    // target breaks the consecutive run).
    #[tokio::test]
    async fn s6_threshold_not_met_emits_nothing() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let v = addr(2);
        history
            .update_proven_performance(5, &[(v, ProvenEpochRecord { epoch: 5, missed: 5, total: 6 })], 10)
            .unwrap();
        history
            .update_proven_performance(6, &[(v, ProvenEpochRecord { epoch: 6, missed: 2, total: 10 })], 10)
            .unwrap();
        let notifier = Arc::new(RecordingNotifier {
            received: StdMutex::new(vec![]),
        });
        let slasher = InactivitySlasher::new(history.clone(), notifier.clone(), config(3, 0.5, 100));

        let epoch7 = ProvenEpochRecord { epoch: 7, missed: 6, total: 6 };
        history.update_proven_performance(7, &[(v, epoch7)], 10).unwrap();
        slasher.evaluate(7, &[(v, epoch7)]).await;

        assert!(notifier.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_penalty_disables_inactivity_slashing() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let v = addr(3);
        let notifier = Arc::new(RecordingNotifier {
            received: StdMutex::new(vec![]),
        });
        let slasher = InactivitySlasher::new(history, notifier.clone(), config(1, 0.0, 0));
        let record = ProvenEpochRecord { epoch: 1, missed: 10, total: 10 };
        slasher.evaluate(1, &[(addr(3), record)]).await;
        assert!(notifier.received.lock().unwrap().is_empty());
        let _ = v;
    }

    #[tokio::test]
    async fn threshold_of_one_needs_no_additional_history() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let v = addr(4);
        let notifier = Arc::new(RecordingNotifier {
            received: StdMutex::new(vec![]),
        });
        let slasher = InactivitySlasher::new(history, notifier.clone(), config(1, 0.5, 50));
        let record = ProvenEpochRecord { epoch: 1, missed: 10, total: 10 };
        slasher.evaluate(1, &[(v, record)]).await;
        assert_eq!(notifier.received.lock().unwrap().len(), 1);
    }
}
