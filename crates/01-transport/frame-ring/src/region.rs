//! Backing memory for the frame ring.
//!
//! The ring needs one flat, zeroed byte array that the producer writes and
//! the consumer reads concurrently. Native builds prefer an anonymous `mmap`
//! (page aligned, lazily committed) and fall back to the heap; WebAssembly
//! always uses the heap. All access goes through a cached base pointer so the
//! two sides never materialise overlapping `&mut [u8]` borrows.

use crate::{RingError, RingResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::{self, NonNull};

const REGION_ALIGN: usize = 8;

/// Selects where the ring's bytes come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionBacking {
    /// Anonymous `mmap` when available, heap otherwise.
    #[default]
    Auto,
    /// Always allocate from the global allocator.
    Heap,
}

#[cfg(not(target_arch = "wasm32"))]
type NativeMap = memmap2::MmapMut;

#[derive(Debug)]
enum Backing {
    #[cfg(not(target_arch = "wasm32"))]
    Native(#[allow(dead_code)] NativeMap),
    Owned { layout: Layout },
}

/// Fixed-length, zero-initialised byte region shared by the two ring halves.
#[derive(Debug)]
pub(crate) struct SharedRegion {
    len: usize,
    base: NonNull<u8>,
    backing: Backing,
}

impl SharedRegion {
    /// Allocates `len` zeroed bytes using the requested backing.
    pub(crate) fn new_zeroed(len: usize, backing: RegionBacking) -> RingResult<Self> {
        if len == 0 {
            return Err(RingError::AllocationFailed { size: len });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            if backing == RegionBacking::Auto {
                if let Some(region) = Self::mmap_backed(len) {
                    return Ok(region);
                }
                tracing::debug!(len, "anonymous mapping unavailable, using heap region");
            }
        }
        #[cfg(target_arch = "wasm32")]
        let _ = backing;

        Self::heap_backed(len)
    }

    fn heap_backed(len: usize) -> RingResult<Self> {
        let layout = Layout::from_size_align(len, REGION_ALIGN)
            .map_err(|_| RingError::AllocationFailed { size: len })?;

        // SAFETY: `layout` has a non-zero size (checked by the caller).
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(RingError::AllocationFailed { size: len })?;
        Ok(Self {
            len,
            base,
            backing: Backing::Owned { layout },
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize) -> Option<Self> {
        // Anonymous mappings are zero-filled by the kernel.
        let mut map = memmap2::MmapOptions::new().len(len).map_anon().ok()?;
        let base = NonNull::new(map.as_mut_ptr())?;
        Some(Self {
            len,
            base,
            backing: Backing::Native(map),
        })
    }

    /// Total number of bytes managed by this region.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the region is backed by an anonymous mapping.
    pub(crate) fn is_mapped(&self) -> bool {
        match self.backing {
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Native(_) => true,
            Backing::Owned { .. } => false,
        }
    }

    /// Stores a host-endian `i32` at `offset`.
    ///
    /// # Safety
    /// The caller must be the only party touching `offset..offset + 4` for the
    /// duration of the call.
    pub(crate) unsafe fn write_i32(&self, offset: usize, value: i32) {
        self.write_bytes(offset, &value.to_ne_bytes());
    }

    /// Loads a host-endian `i32` from `offset`.
    ///
    /// # Safety
    /// No other party may be writing `offset..offset + 4` concurrently.
    pub(crate) unsafe fn read_i32(&self, offset: usize) -> i32 {
        self.debug_check_range(offset, 4);
        let mut buf = [0u8; 4];
        ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), buf.as_mut_ptr(), 4);
        i32::from_ne_bytes(buf)
    }

    /// Copies `src` into the region starting at `offset`.
    ///
    /// # Safety
    /// Same contract as [`SharedRegion::write_i32`] for the written range.
    pub(crate) unsafe fn write_bytes(&self, offset: usize, src: &[u8]) {
        self.debug_check_range(offset, src.len());
        if src.is_empty() {
            return;
        }
        ptr::copy_nonoverlapping(src.as_ptr(), self.base.as_ptr().add(offset), src.len());
    }

    /// Appends `len` bytes starting at `offset` to `out`.
    ///
    /// # Safety
    /// Same contract as [`SharedRegion::read_i32`] for the read range.
    pub(crate) unsafe fn append_to(&self, offset: usize, len: usize, out: &mut Vec<u8>) {
        self.debug_check_range(offset, len);
        if len == 0 {
            return;
        }
        let src = std::slice::from_raw_parts(self.base.as_ptr().add(offset), len);
        out.extend_from_slice(src);
    }

    #[inline]
    fn debug_check_range(&self, offset: usize, len: usize) {
        debug_assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            "region access {offset}+{len} outside {} bytes",
            self.len
        );
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Backing::Owned { layout } = &self.backing {
            // SAFETY: `base` was returned by `alloc_zeroed` with this exact layout.
            unsafe {
                dealloc(self.base.as_ptr(), *layout);
            }
        }
    }
}
