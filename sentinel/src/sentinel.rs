//! Top-level facade wiring the scheduler (`SlotObserver`), the block-stream
//! glue, the proven-performance analyzer and the inactivity slasher behind
//! the interface a host node embeds: `start`/`stop`, `updateConfig`,
//! `computeStats`, `getValidatorStats`, plus a push point for block-stream
//! events (subscribing to the stream itself is the host's job, not this
//! crate's).

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{ConfigHandle, ConfigPatch, SentinelConfig},
    error::{Result, SentinelError},
    history_store::HistoryPersistence,
    inactivity_slasher::InactivitySlasher,
    proven_performance::ProvenPerformanceAnalyzer,
    slot_index::SlotIndex,
    slot_observer::SlotObserver,
    stats_reporter::{StatsQuery, StatsReporter, SingleValidatorStats, ValidatorsStats},
    tip_tracker::TipTracker,
    traits::{AttestationPool, BlockSource, BlockStreamEvent, EpochCache, SlashNotifier},
    types::ValidatorAddress,
};

pub struct Sentinel<E, B, A, S, N> {
    epoch_cache: Arc<E>,
    history: Arc<S>,
    config: Arc<ConfigHandle>,
    slot_index: Arc<Mutex<SlotIndex>>,
    tip_tracker: Arc<Mutex<TipTracker>>,
    observer: Arc<SlotObserver<E, B, A, S>>,
    proven_analyzer: Arc<ProvenPerformanceAnalyzer<E, S, N>>,
    cancellation: CancellationToken,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl<E, B, A, S, N> Sentinel<E, B, A, S, N>
where
    E: EpochCache + 'static,
    B: BlockSource + 'static,
    A: AttestationPool + 'static,
    S: HistoryPersistence + 'static,
    N: SlashNotifier + 'static,
{
    pub fn new(
        epoch_cache: Arc<E>,
        block_source: Arc<B>,
        attestation_pool: Arc<A>,
        history: Arc<S>,
        notifier: Arc<N>,
        config: SentinelConfig,
    ) -> Result<Self> {
        let config = Arc::new(ConfigHandle::new(config)?);
        let slot_index = Arc::new(Mutex::new(SlotIndex::new()));
        let tip_tracker = Arc::new(Mutex::new(TipTracker::new()));

        let observer = Arc::new(SlotObserver::new(
            epoch_cache.clone(),
            block_source,
            attestation_pool,
            history.clone(),
            slot_index.clone(),
            tip_tracker.clone(),
            config.clone(),
        ));

        let slasher = InactivitySlasher::new(history.clone(), notifier, config.clone());
        let proven_analyzer = Arc::new(ProvenPerformanceAnalyzer::new(
            epoch_cache.clone(),
            history.clone(),
            slasher,
        ));

        Ok(Self {
            epoch_cache,
            history,
            config,
            slot_index,
            tip_tracker,
            observer,
            proven_analyzer,
            cancellation: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Starts the scheduler loop on a background task. Idempotent: calling
    /// `start` while already running is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().expect("lock poisoned");
        if task.is_some() {
            return;
        }
        let observer = self.observer.clone();
        let cancellation = self.cancellation.clone();
        *task = Some(tokio::spawn(async move { observer.run(cancellation).await }));
    }

    /// Signals cancellation and awaits the scheduler task's exit.
    pub async fn stop(&self) -> Result<()> {
        self.cancellation.cancel();
        let handle = self.task.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| SentinelError::External(Box::new(e)))??;
        }
        Ok(())
    }

    /// Hot-reloads the recognized configuration options. Rejected patches
    /// leave the previous configuration untouched.
    pub fn update_config(&self, patch: ConfigPatch) -> Result<()> {
        self.config.update(patch)
    }

    /// Feeds one block-stream event into the shared `SlotIndex` and
    /// `TipTracker`, additionally triggering proven-performance analysis on
    /// `chain-proven` events. Subscribing to the stream itself is the host's
    /// responsibility; this is the push point.
    pub async fn handle_block_stream_event(&self, event: BlockStreamEvent) -> Result<()> {
        let l1 = self.epoch_cache.l1_constants().await?;
        let window_slots = self.config.load().window_slots(l1.slots_per_epoch);
        crate::block_stream::apply_block_stream_event(&self.slot_index, &self.tip_tracker, &event, window_slots)?;

        if let BlockStreamEvent::ChainProven { block } = &event {
            let window_epochs = self.config.load().historic_proven_performance_length_in_epochs;
            self.proven_analyzer
                .on_chain_proven(block.slot, l1.slots_per_epoch, window_epochs)
                .await?;
        }
        Ok(())
    }

    pub async fn compute_stats(
        &self,
        query: StatsQuery,
        validators: Option<&[ValidatorAddress]>,
    ) -> Result<ValidatorsStats> {
        let reporter = StatsReporter::new(self.history.as_ref(), self.window_slots().await?);
        match validators {
            Some(addrs) => {
                let mut out = ValidatorsStats::default();
                for &address in addrs {
                    if let Some(stats) = reporter.validator_stats(address, query)? {
                        out.insert(address, stats);
                    }
                }
                Ok(out)
            }
            None => reporter.all_validators_stats(query),
        }
    }

    pub async fn get_validator_stats(
        &self,
        address: ValidatorAddress,
        query: StatsQuery,
    ) -> Result<Option<SingleValidatorStats>> {
        StatsReporter::new(self.history.as_ref(), self.window_slots().await?).validator_stats(address, query)
    }

    async fn window_slots(&self) -> Result<u64> {
        let l1 = self.epoch_cache.l1_constants().await?;
        Ok(self.config.load().window_slots(l1.slots_per_epoch))
    }
}
