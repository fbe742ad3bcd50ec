//! Core identifiers and records shared by every sentinel component.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Monotonic L2 slot number. A slot may or may not contain a block.
pub type SlotNumber = u64;

/// L2 epoch number, derived from a slot via the L1 constants (`slotsPerEpoch`).
pub type EpochNumber = u64;

/// A 20-byte L1 validator identity, keyed by its lowercase canonical hex form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorAddress(pub [u8; 20]);

impl ValidatorAddress {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for ValidatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorAddress({self})")
    }
}

impl fmt::Display for ValidatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ValidatorAddress {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 20];
        hex::decode_to_slice(stripped.to_ascii_lowercase(), &mut out)?;
        Ok(Self(out))
    }
}

/// Opaque 32-byte rollup state anchor uniquely identifying a proposal at a slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArchiveRoot(pub [u8; 32]);

impl fmt::Debug for ArchiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveRoot({self})")
    }
}

impl fmt::Display for ArchiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Per-slot observation recorded for one validator.
///
/// The `absent` case of the distilled status enum is represented by simply
/// not recording an entry, matching "not recorded" in the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerSlotStatus {
    /// Proposer produced a block that reached L1.
    BlockMined,
    /// Proposer broadcast; attestations were seen but no L1 block yet.
    BlockProposed,
    /// Proposer neither mined nor attracted attestations.
    BlockMissed,
    /// Committee member (non-proposer) attested.
    AttestationSent,
    /// Committee member attestation expected but not observed.
    AttestationMissed,
}

impl PerSlotStatus {
    /// Structural analogue of the `"block-"` / `"attestation-"` prefix
    /// partitioning named in the design notes: which duty class this status
    /// belongs to.
    pub fn duty(self) -> Duty {
        match self {
            Self::BlockMined | Self::BlockProposed | Self::BlockMissed => Duty::Proposal,
            Self::AttestationSent | Self::AttestationMissed => Duty::Attestation,
        }
    }

    pub fn is_missed(self) -> bool {
        matches!(self, Self::BlockMissed | Self::AttestationMissed)
    }
}

/// Which duty class a [`PerSlotStatus`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Duty {
    Proposal,
    Attestation,
}

/// One entry in a validator's sliding-window history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoryEntry {
    pub slot: SlotNumber,
    pub status: PerSlotStatus,
}

/// Ordered, append-only (within the window) sequence of a validator's
/// per-slot observations, oldest first.
pub type ValidatorHistory = Vec<ValidatorHistoryEntry>;

/// A validator's proven performance for one epoch.
///
/// `total` counts only proposal-bearing slots in the epoch for which this
/// validator had a duty; `missed` counts attestation-missed and
/// block-missed events observed within those slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenEpochRecord {
    pub epoch: EpochNumber,
    pub missed: u64,
    pub total: u64,
}

impl ProvenEpochRecord {
    /// `missed / total`, or `None` when `total == 0` (no proposal-bearing
    /// slots observed in the epoch for this validator).
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.missed as f64 / self.total as f64)
        }
    }
}

/// What `SlotIndex` knows about a mined block at a given slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotIndexEntry {
    pub block_number: u64,
    pub archive: ArchiveRoot,
    pub attestors: BTreeSet<ValidatorAddress>,
}

/// A committee assignment for a slot, as reported by the epoch cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitteeAssignment {
    pub epoch: EpochNumber,
    pub seed: [u8; 32],
    pub committee: Vec<ValidatorAddress>,
}

/// A recommended slash, emitted to a [`crate::traits::SlashNotifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashIntent {
    pub validator: ValidatorAddress,
    pub amount: primitive_types::U256,
    pub offense_type: OffenseType,
    pub epoch_or_slot: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffenseType {
    Inactivity,
}
