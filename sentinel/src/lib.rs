//! Validator sentinel: observes on-chain block production and gossip
//! attestation evidence of validator duties, maintains bounded-window
//! per-validator history and proven-performance records, and recommends
//! inactivity slashes to an injected notifier.

pub mod block_stream;
pub mod config;
pub mod error;
pub mod history_store;
pub mod inactivity_slasher;
pub mod proven_performance;
pub mod sentinel;
pub mod slot_index;
pub mod slot_observer;
pub mod stats_reporter;
pub mod tip_tracker;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Test-only tracing setup. Kept separate from `testing` (which is also
/// built under `feature = "testing"` for downstream consumers that don't
/// pull in dev-dependencies) since `tracing-subscriber` is a dev-dependency.
#[cfg(test)]
pub(crate) mod test_support {
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub use config::{ConfigHandle, ConfigPatch, SentinelConfig};
pub use error::{Result, SentinelError};
pub use sentinel::Sentinel;
pub use stats_reporter::{SingleValidatorStats, StatsQuery, ValidatorsStats};
pub use traits::{AttestationPool, BlockSource, BlockStreamEvent, EpochCache, L1Constants, SlashNotifier};
pub use types::{
    ArchiveRoot, CommitteeAssignment, EpochNumber, OffenseType, PerSlotStatus, ProvenEpochRecord, SlashIntent,
    SlotNumber, ValidatorAddress, ValidatorHistory, ValidatorHistoryEntry,
};
