//! Sentinel configuration: the recognized options from the data model,
//! validated at construction and at every hot-reload, and picked up by the
//! next scheduler tick via atomic snapshot replacement.

use std::sync::Arc;

use arc_swap::ArcSwap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// Recognized, validated sentinel configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Window size, in epochs, for per-slot history (`W_slots = this *
    /// slots_per_epoch`).
    pub history_length_in_epochs: u32,
    /// Window size, in epochs, for per-epoch proven performance. Must be
    /// `>= slash_inactivity_consecutive_epoch_threshold`.
    pub historic_proven_performance_length_in_epochs: u32,
    /// Missed/total ratio at or above which a proven epoch counts as
    /// "inactive" for a validator, in `[0, 1]`.
    pub slash_inactivity_target_percentage: f64,
    /// Number of consecutive inactive proven epochs required before a
    /// slash is recommended.
    pub slash_inactivity_consecutive_epoch_threshold: u32,
    /// Amount to slash. Zero disables inactivity slashing entirely.
    pub slash_inactivity_penalty: U256,
}

impl SentinelConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.slash_inactivity_target_percentage) {
            return Err(SentinelError::InvalidConfig(format!(
                "slash_inactivity_target_percentage must be in [0, 1], got {}",
                self.slash_inactivity_target_percentage
            )));
        }
        if self.historic_proven_performance_length_in_epochs
            < self.slash_inactivity_consecutive_epoch_threshold
        {
            return Err(SentinelError::InvalidConfig(format!(
                "historic_proven_performance_length_in_epochs ({}) must be >= \
                 slash_inactivity_consecutive_epoch_threshold ({})",
                self.historic_proven_performance_length_in_epochs,
                self.slash_inactivity_consecutive_epoch_threshold
            )));
        }
        Ok(())
    }

    pub fn window_slots(&self, slots_per_epoch: u32) -> u64 {
        self.history_length_in_epochs as u64 * slots_per_epoch as u64
    }

    pub fn inactivity_slashing_enabled(&self) -> bool {
        !self.slash_inactivity_penalty.is_zero()
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            history_length_in_epochs: 4,
            historic_proven_performance_length_in_epochs: 4,
            slash_inactivity_target_percentage: 0.5,
            slash_inactivity_consecutive_epoch_threshold: 3,
            slash_inactivity_penalty: U256::zero(),
        }
    }
}

/// A partial patch applied on top of the currently active configuration by
/// `updateConfig`. Fields left `None` keep their current value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub history_length_in_epochs: Option<u32>,
    pub historic_proven_performance_length_in_epochs: Option<u32>,
    pub slash_inactivity_target_percentage: Option<f64>,
    pub slash_inactivity_consecutive_epoch_threshold: Option<u32>,
    pub slash_inactivity_penalty: Option<U256>,
}

/// Atomically-swappable configuration snapshot. Each tick of the scheduler
/// reads `load()` once at the start of the tick; `update` validates the
/// resulting configuration before swapping it in, so a rejected patch never
/// partially applies.
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<SentinelConfig>,
}

impl ConfigHandle {
    pub fn new(initial: SentinelConfig) -> Result<Self> {
        initial.validate()?;
        Ok(Self {
            current: ArcSwap::from_pointee(initial),
        })
    }

    pub fn load(&self) -> Arc<SentinelConfig> {
        self.current.load_full()
    }

    pub fn update(&self, patch: ConfigPatch) -> Result<()> {
        let mut next = (*self.current.load_full()).clone();
        if let Some(v) = patch.history_length_in_epochs {
            next.history_length_in_epochs = v;
        }
        if let Some(v) = patch.historic_proven_performance_length_in_epochs {
            next.historic_proven_performance_length_in_epochs = v;
        }
        if let Some(v) = patch.slash_inactivity_target_percentage {
            next.slash_inactivity_target_percentage = v;
        }
        if let Some(v) = patch.slash_inactivity_consecutive_epoch_threshold {
            next.slash_inactivity_consecutive_epoch_threshold = v;
        }
        if let Some(v) = patch.slash_inactivity_penalty {
            next.slash_inactivity_penalty = v;
        }
        next.validate()?;
        self.current.store(Arc::new(next));
        Ok(())
    }
}
