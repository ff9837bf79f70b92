//! Error surface for the frame ring.
//!
//! `Full` and `Empty` are ordinary back-pressure signals and leave the ring
//! untouched. `Corrupted` means the single-producer/single-consumer contract
//! was broken or the region was scribbled on; callers should stop using the
//! ring once they see it.

use thiserror::Error;

/// Convenience result alias for fallible ring operations.
pub type RingResult<T, E = RingError> = Result<T, E>;

/// Errors surfaced by [`FrameRing`](crate::FrameRing) and its halves.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RingError {
    /// The frame (header + payload) cannot be placed in the free region right now.
    #[error("frame of {need} bytes does not fit in the free region")]
    Full { need: u64 },

    /// No frame has been published since the last pop.
    #[error("ring is empty")]
    Empty,

    /// The payload cannot be described by a frame header.
    #[error("payload of {len} bytes exceeds the {max}-byte header limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// A frame header violated the ring layout (double skip, overrun, bad skip length).
    #[error("corrupt frame header {header} at logical offset {position}")]
    Corrupted { position: u64, header: i32 },

    /// Requested ring capacity is zero or cannot be addressed by a skip header.
    #[error("ring capacity {requested} must be between 1 and {maximum} bytes")]
    InvalidCapacity { requested: u64, maximum: u64 },

    /// Allocation of the backing region failed.
    #[error("failed to allocate a {size}-byte ring region")]
    AllocationFailed { size: usize },
}

impl RingError {
    /// Returns true for the back-pressure outcomes a caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RingError::Full { .. } | RingError::Empty)
    }
}
