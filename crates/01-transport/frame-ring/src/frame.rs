//! Frame header encoding.
//!
//! Every frame starts with a host-endian `i32`. A non-negative value is the
//! payload length that follows; a negative value marks a skip pseudo-frame
//! whose magnitude is the number of tail bytes to jump over.

/// Size of the length prefix in front of every frame.
pub const HEADER_LEN: usize = 4;

/// Largest payload a header can describe.
pub const MAX_FRAME_PAYLOAD: usize = i32::MAX as usize;

/// Decoded view of a frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrameHeader {
    /// A real frame carrying `len` payload bytes.
    Payload(u32),
    /// Padding up to the physical end of the ring.
    Skip(u32),
}

impl FrameHeader {
    pub(crate) fn from_raw(raw: i32) -> Self {
        if raw >= 0 {
            FrameHeader::Payload(raw as u32)
        } else {
            FrameHeader::Skip(raw.unsigned_abs())
        }
    }

    /// Signed on-region representation.
    pub(crate) fn raw(self) -> i32 {
        match self {
            FrameHeader::Payload(len) => {
                debug_assert!(len as usize <= MAX_FRAME_PAYLOAD);
                len as i32
            }
            FrameHeader::Skip(bytes) => {
                debug_assert!(bytes > 0 && bytes as usize <= MAX_FRAME_PAYLOAD);
                -(bytes as i32)
            }
        }
    }
}
