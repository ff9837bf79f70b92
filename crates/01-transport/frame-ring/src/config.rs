//! Construction parameters for [`FrameRing`](crate::FrameRing).

use crate::frame::{HEADER_LEN, MAX_FRAME_PAYLOAD};
use crate::region::RegionBacking;
use crate::{RingError, RingResult};

/// Largest capacity whose tail length always fits in a skip header.
pub const MAX_CAPACITY: u64 = MAX_FRAME_PAYLOAD as u64;

/// Configuration describing the shape of a frame ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingConfig {
    /// Usable logical bytes, headers included.
    pub capacity: u64,
    /// Where the region's bytes are allocated.
    pub backing: RegionBacking,
}

impl RingConfig {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            backing: RegionBacking::Auto,
        }
    }

    pub fn with_backing(mut self, backing: RegionBacking) -> Self {
        self.backing = backing;
        self
    }

    /// Rejects capacities the ring cannot represent.
    pub fn validate(&self) -> RingResult<()> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(RingError::InvalidCapacity {
                requested: self.capacity,
                maximum: MAX_CAPACITY,
            });
        }
        Ok(())
    }

    /// Physical region length: a trailing skip header may start at the last
    /// logical byte, so `HEADER_LEN - 1` bytes of slack follow the capacity.
    pub(crate) fn region_len(&self) -> usize {
        self.capacity as usize + (HEADER_LEN - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_oversized_capacities_are_rejected() {
        for capacity in [0, MAX_CAPACITY + 1, u64::MAX] {
            assert_eq!(
                RingConfig::new(capacity).validate(),
                Err(RingError::InvalidCapacity {
                    requested: capacity,
                    maximum: MAX_CAPACITY,
                })
            );
        }
        assert!(RingConfig::new(1).validate().is_ok());
        assert!(RingConfig::new(MAX_CAPACITY).validate().is_ok());
    }

    #[test]
    fn region_carries_header_slack() {
        assert_eq!(RingConfig::new(64).region_len(), 67);
        assert_eq!(RingConfig::new(1).region_len(), 4);
    }
}
