//! Single-producer/single-consumer frame ring implementation.
//!
//! Layout:
//!
//! ```text
//!  0                                            capacity   capacity+3
//!  +--------------------------------------------+----------+
//!  | [len][payload] [len][payload] ...          | slack    |
//!  +--------------------------------------------+----------+
//!     ^ read % capacity      ^ write % capacity
//!
//!  Wrapped:
//!  | [len][payload] ...    [len][payload] ... [-skip]       |
//!                    ^ write              ^ read
//! ```
//!
//! Cursors are logical `u64` offsets that only grow; the physical position is
//! `cursor % capacity`. A frame never straddles the physical end: when the
//! tail is too short the producer writes a negative skip header covering the
//! rest of the tail and places the frame at offset 0. The skip header itself
//! may start at the last logical byte, which is what the slack absorbs.
//!
//! The producer copies the frame in, then publishes `write` with `Release`.
//! The consumer loads `write` with `Acquire`, copies the frame out, then
//! publishes `read` with `Release`, which the producer's admission check
//! loads with `Acquire` before reusing the space.

use crate::config::RingConfig;
use crate::frame::{FrameHeader, HEADER_LEN, MAX_FRAME_PAYLOAD};
use crate::region::SharedRegion;
use crate::{RingError, RingResult};
use crossbeam_utils::CachePadded;
#[cfg(feature = "loom")]
use loom::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "loom")]
use loom::sync::Arc;
#[cfg(not(feature = "loom"))]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(not(feature = "loom"))]
use std::sync::Arc;

const HEADER: u64 = HEADER_LEN as u64;

/// Maps a logical cursor onto the region.
#[inline]
pub(crate) fn physical(cursor: u64, capacity: u64) -> u64 {
    cursor % capacity
}

/// Admission rule shared by `is_full` and `push`.
///
/// Free logical space alone is not enough: the frame must also fit
/// contiguously, either in the tail after `write` or, once wrapped, in front
/// of `read`. A frame whose header would straddle the physical end is placed
/// at offset 0 instead, so the tail it abandons counts against the reader.
pub(crate) fn admits(read: u64, write: u64, capacity: u64, payload_len: u64) -> bool {
    let Some(cost) = payload_len.checked_add(HEADER) else {
        return false;
    };
    let Some(end) = write.checked_add(cost) else {
        return false;
    };
    if end - read > capacity {
        return false;
    }

    let read_pos = physical(read, capacity);
    let write_pos = physical(write, capacity);
    if read_pos <= write_pos {
        write_pos + cost <= capacity || cost <= read_pos
    } else {
        write_pos + cost <= read_pos
    }
}

fn payload_len(payload: &[u8]) -> RingResult<u32> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(RingError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }
    Ok(payload.len() as u32)
}

/// State shared between the producer and consumer sides.
struct RingCore {
    region: SharedRegion,
    capacity: u64,
    write: CachePadded<AtomicU64>,
    read: CachePadded<AtomicU64>,
}

// SAFETY: the region is only reached through `push` and `pop_into`, whose
// callers guarantee a single producer and a single consumer. The producer
// writes bytes outside `[read, write)` and the consumer reads bytes inside it;
// the release/acquire cursor handoff orders those accesses.
unsafe impl Send for RingCore {}
unsafe impl Sync for RingCore {}

impl RingCore {
    fn new(config: RingConfig) -> RingResult<Self> {
        config.validate()?;
        let region = SharedRegion::new_zeroed(config.region_len(), config.backing)?;
        tracing::debug!(
            capacity = config.capacity,
            region_len = region.len(),
            mapped = region.is_mapped(),
            "frame ring created"
        );
        Ok(Self {
            region,
            capacity: config.capacity,
            write: CachePadded::new(AtomicU64::new(0)),
            read: CachePadded::new(AtomicU64::new(0)),
        })
    }

    fn len_bytes(&self) -> u64 {
        // `read` first: `write` can only have grown by the time it is loaded.
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        write - read
    }

    fn is_empty(&self) -> bool {
        self.len_bytes() == 0
    }

    fn is_full(&self, payload_len: u64) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        !admits(read, write, self.capacity, payload_len)
    }

    /// Appends one frame.
    ///
    /// # Safety
    /// Must only be called from the single producer.
    unsafe fn push(&self, payload: &[u8]) -> RingResult<()> {
        let len = payload_len(payload)?;
        let cost = HEADER + len as u64;
        let capacity = self.capacity;

        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        if !admits(read, write, capacity, len as u64) {
            return Err(RingError::Full { need: cost });
        }

        let mut cursor = write;
        let pos = physical(cursor, capacity);
        let tail = capacity - pos;
        if tail < cost {
            self.region
                .write_i32(pos as usize, FrameHeader::Skip(tail as u32).raw());
            tracing::trace!(at = cursor, skip = tail, "frame ring wrap");
            cursor += tail;
        }

        let pos = physical(cursor, capacity) as usize;
        self.region
            .write_i32(pos, FrameHeader::Payload(len).raw());
        self.region.write_bytes(pos + HEADER_LEN, payload);

        self.write.store(cursor + cost, Ordering::Release);
        Ok(())
    }

    /// Consumes one frame, appending its payload to `out`.
    ///
    /// # Safety
    /// Must only be called from the single consumer.
    unsafe fn pop_into(&self, out: &mut Vec<u8>) -> RingResult<usize> {
        let capacity = self.capacity;
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        if read == write {
            return Err(RingError::Empty);
        }

        let mut cursor = read;
        let mut pos = physical(cursor, capacity);
        let mut raw = self.region.read_i32(pos as usize);

        if let FrameHeader::Skip(skip) = FrameHeader::from_raw(raw) {
            // The writer only pads up to the physical end, and always
            // publishes the padded frame together with the skip.
            if skip as u64 != capacity - pos || cursor + skip as u64 >= write {
                return Err(self.corrupted(cursor, raw));
            }
            tracing::trace!(at = cursor, skip, "frame ring wrap");
            cursor += skip as u64;
            pos = physical(cursor, capacity);
            raw = self.region.read_i32(pos as usize);
        }

        let len = match FrameHeader::from_raw(raw) {
            FrameHeader::Payload(len) => len as u64,
            FrameHeader::Skip(_) => return Err(self.corrupted(cursor, raw)),
        };

        let end = cursor + HEADER + len;
        if end > write || pos + HEADER + len > capacity {
            return Err(self.corrupted(cursor, raw));
        }

        self.region
            .append_to(pos as usize + HEADER_LEN, len as usize, out);
        self.read.store(end, Ordering::Release);
        Ok(len as usize)
    }

    fn corrupted(&self, position: u64, header: i32) -> RingError {
        tracing::error!(
            position,
            header,
            capacity = self.capacity,
            "frame ring corrupted; single producer/consumer contract violated"
        );
        RingError::Corrupted { position, header }
    }

    #[cfg(all(test, not(feature = "loom")))]
    fn force_cursors(&self, read: u64, write: u64) {
        assert!(read <= write && write - read <= self.capacity);
        self.read.store(read, Ordering::Relaxed);
        self.write.store(write, Ordering::Relaxed);
    }

    #[cfg(all(test, not(feature = "loom")))]
    fn cursors(&self) -> (u64, u64) {
        (
            self.read.load(Ordering::Relaxed),
            self.write.load(Ordering::Relaxed),
        )
    }
}

/// Fixed-capacity ring of variable-length byte frames.
///
/// Used directly, a `FrameRing` is driven from one thread through `&mut self`.
/// [`FrameRing::split`] hands out a [`Producer`] and a [`Consumer`] that may
/// live on different threads.
pub struct FrameRing {
    core: RingCore,
}

impl FrameRing {
    /// Creates a ring with `capacity` usable bytes (frame headers included).
    pub fn new(capacity: u64) -> RingResult<Self> {
        Self::with_config(RingConfig::new(capacity))
    }

    pub fn with_config(config: RingConfig) -> RingResult<Self> {
        Ok(Self {
            core: RingCore::new(config)?,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.core.capacity
    }

    /// Largest payload that can ever be admitted: an empty ring whose cursors
    /// sit at physical offset 0. An empty ring at offset `p` admits a frame
    /// only if it fits in `max(capacity - p, p)` bytes, so payloads up to
    /// `ceil(capacity / 2) - 4` bytes are admitted at any cursor position.
    pub fn max_payload(&self) -> u64 {
        max_payload(self.core.capacity)
    }

    /// Logical bytes currently occupied, including headers and skip padding.
    pub fn len_bytes(&self) -> u64 {
        self.core.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    /// Returns true when a frame carrying `payload_len` bytes cannot be pushed now.
    pub fn is_full(&self, payload_len: u64) -> bool {
        self.core.is_full(payload_len)
    }

    /// Copies `payload` into the ring as one frame.
    ///
    /// Fails with [`RingError::Full`] without touching the ring when the frame
    /// does not fit; retrying is up to the caller.
    pub fn push(&mut self, payload: &[u8]) -> RingResult<()> {
        // SAFETY: `&mut self` makes this the only producer.
        unsafe { self.core.push(payload) }
    }

    /// Appends the oldest frame's payload to `out` and returns its length.
    ///
    /// `out` is never cleared, so a caller can reuse one buffer across pops.
    pub fn pop_into(&mut self, out: &mut Vec<u8>) -> RingResult<usize> {
        // SAFETY: `&mut self` makes this the only consumer.
        unsafe { self.core.pop_into(out) }
    }

    /// Allocating variant of [`FrameRing::pop_into`].
    pub fn pop(&mut self) -> RingResult<Vec<u8>> {
        let mut out = Vec::new();
        self.pop_into(&mut out)?;
        Ok(out)
    }

    /// Splits the ring into its producer and consumer halves.
    pub fn split(self) -> (Producer, Consumer) {
        tracing::debug!(capacity = self.core.capacity, "frame ring split");
        let core = Arc::new(self.core);
        (
            Producer {
                core: Arc::clone(&core),
            },
            Consumer { core },
        )
    }
}

impl std::fmt::Debug for FrameRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRing")
            .field("capacity", &self.core.capacity)
            .field("len_bytes", &self.core.len_bytes())
            .finish()
    }
}

fn max_payload(capacity: u64) -> u64 {
    capacity.saturating_sub(HEADER)
}

/// Writing half of a split [`FrameRing`].
///
/// Not `Clone`: there is exactly one producer per ring.
pub struct Producer {
    core: Arc<RingCore>,
}

impl Producer {
    pub fn capacity(&self) -> u64 {
        self.core.capacity
    }

    pub fn max_payload(&self) -> u64 {
        max_payload(self.core.capacity)
    }

    pub fn len_bytes(&self) -> u64 {
        self.core.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn is_full(&self, payload_len: u64) -> bool {
        self.core.is_full(payload_len)
    }

    /// See [`FrameRing::push`].
    pub fn push(&mut self, payload: &[u8]) -> RingResult<()> {
        // SAFETY: `Producer` is unique per ring and `&mut self` serialises callers.
        unsafe { self.core.push(payload) }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.core.capacity)
            .finish_non_exhaustive()
    }
}

/// Reading half of a split [`FrameRing`].
///
/// Not `Clone`: there is exactly one consumer per ring.
pub struct Consumer {
    core: Arc<RingCore>,
}

impl Consumer {
    pub fn capacity(&self) -> u64 {
        self.core.capacity
    }

    pub fn len_bytes(&self) -> u64 {
        self.core.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    /// See [`FrameRing::pop_into`].
    pub fn pop_into(&mut self, out: &mut Vec<u8>) -> RingResult<usize> {
        // SAFETY: `Consumer` is unique per ring and `&mut self` serialises callers.
        unsafe { self.core.pop_into(out) }
    }

    pub fn pop(&mut self) -> RingResult<Vec<u8>> {
        let mut out = Vec::new();
        self.pop_into(&mut out)?;
        Ok(out)
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.core.capacity)
            .finish_non_exhaustive()
    }
}
