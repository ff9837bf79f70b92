//! Lock-free single-producer/single-consumer ring of variable-length byte frames.
//!
//! * [`FrameRing`] – fixed-capacity ring packing `[i32 len][payload]` frames
//!   into one flat region, with skip frames at the wrap point.
//! * [`Producer`] / [`Consumer`] – the two halves returned by [`FrameRing::split`]
//!   for use from two threads.
//! * [`RingConfig`] / [`RegionBacking`] – capacity and backing-memory selection.
//! * [`RingError`] – `Full`/`Empty` back-pressure plus fatal corruption reports.
//!
//! `push` and `pop` never block; retrying on `Full`/`Empty` is the caller's
//! policy.

mod config;
mod error;
mod frame;
mod frame_ring;
mod region;

pub use config::{RingConfig, MAX_CAPACITY};
pub use error::{RingError, RingResult};
pub use frame::{HEADER_LEN, MAX_FRAME_PAYLOAD};
pub use frame_ring::{Consumer, FrameRing, Producer};
pub use region::RegionBacking;
