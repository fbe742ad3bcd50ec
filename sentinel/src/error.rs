//! Error taxonomy for the sentinel, grouped per the error-handling design in
//! the specification: transient I/O, preconditions unmet, invariant
//! violations, user-query errors and fatal failures. Each category is a
//! distinct variant so callers match on it instead of string-sniffing.

use crate::types::SlotNumber;

/// An error surfaced by an external collaborator (`EpochCache`,
/// `BlockSource` or `AttestationPool`). The sentinel only requires
/// `std::error::Error + Send + Sync + 'static`; adapters own their own
/// concrete error types and box them into this wrapper.
pub type ExternalError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum SentinelError {
    /// A block-stream event was already applied to the `TipTracker`.
    #[error("block-stream event already applied")]
    AlreadyApplied,

    /// A block-stream event arrived out of order relative to the tracked tip.
    #[error("block-stream event out of order")]
    OutOfOrderEvent,

    /// `HistoryStore` could not complete a read or write. Fatal for the
    /// current scheduler iteration; the next tick retries.
    #[error("history store unavailable: {0}")]
    StorageUnavailable(String),

    /// A `StatsReporter` query asked for a range wider than the retained
    /// history window.
    #[error("requested range [{from}, {to}] exceeds retained window of {window} slots")]
    RangeExceedsWindow {
        from: SlotNumber,
        to: SlotNumber,
        window: u64,
    },

    /// A configuration update failed validation and was rejected; the
    /// previously active configuration remains in effect.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An external collaborator (epoch cache, block source, attestation
    /// pool) failed. Treated as transient I/O by the scheduler loop.
    #[error("external collaborator error: {0}")]
    External(#[from] ExternalError),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
