//! # Page Frame Pool
//!
//! A fixed arena of [`FrameDescriptor`]s threaded onto an intrusive, doubly
//! linked free list. Links are slot indices into the arena rather than
//! pointers, so the pool can live in a `static` and be moved freely before
//! it is initialized.
//!
//! ```text
//!  free_head
//!     │
//!     ▼
//!  ┌──────┐ next ┌──────┐ next ┌──────┐        ┌──────┐
//!  │  #0  │─────▶│  #1  │─────▶│  #2  │─ ... ─▶│ #127 │─▶ None
//!  │ 1MiB │◀─────│ 3MiB │◀─────│ 5MiB │        │      │
//!  └──────┘ prev └──────┘ prev └──────┘        └──────┘
//! ```
//!
//! [`FramePool::allocate`] detaches a run from the front of the free list and
//! hands it out as a [`FrameList`]; [`FramePool::free`] splices a whole list
//! back onto the front. Every descriptor is on exactly one list at a time, so
//! `free_len() + Σ list.len() == capacity()` holds throughout.

use core::iter::FusedIterator;
use core::ops::Index;
use kernel_info::memory::{FRAME_POOL_BASE, FRAME_POOL_LEN, FRAME_STRIDE};
use kernel_memory_addresses::PhysicalAddress;
use log::{debug, info, warn};

/// Slot of a descriptor within its [`FramePool`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameIndex(u16);

impl FrameIndex {
    #[inline]
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    const fn from_usize(index: usize) -> Self {
        debug_assert!(index <= u16::MAX as usize);
        Self(index as u16)
    }
}

/// One physical page frame and its list links.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameDescriptor {
    physical_address: PhysicalAddress,
    prev: Option<FrameIndex>,
    next: Option<FrameIndex>,
}

impl FrameDescriptor {
    const UNLINKED: Self = Self {
        physical_address: PhysicalAddress::new(0),
        prev: None,
        next: None,
    };

    /// Physical base of the frame. Fixed once the pool is initialized.
    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.physical_address
    }

    #[inline]
    #[must_use]
    pub const fn prev(&self) -> Option<FrameIndex> {
        self.prev
    }

    #[inline]
    #[must_use]
    pub const fn next(&self) -> Option<FrameIndex> {
        self.next
    }
}

/// A detached, non-empty run of descriptors owned by the caller.
///
/// The handle is neither `Copy` nor `Clone`: giving it back through
/// [`FramePool::free`] consumes it, so a list cannot be freed twice.
#[derive(Debug, Eq, PartialEq)]
#[must_use = "dropping a FrameList leaks its frames; give it back with FramePool::free"]
pub struct FrameList {
    head: FrameIndex,
    tail: FrameIndex,
    len: usize,
}

impl FrameList {
    /// First descriptor of the run.
    #[inline]
    #[must_use]
    pub const fn head(&self) -> FrameIndex {
        self.head
    }

    /// Last descriptor of the run.
    #[inline]
    #[must_use]
    pub const fn tail(&self) -> FrameIndex {
        self.tail
    }

    /// Number of descriptors in the run (at least one).
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; empty lists are never handed out.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("a frame list needs at least one frame")]
    ZeroFrames,
    #[error("requested {requested} frames but only {available} are free")]
    Exhausted { requested: usize, available: usize },
}

/// Fixed pool of `N` page-frame descriptors.
///
/// Descriptor `i` stands for the frame at `base + i * stride`.
pub struct FramePool<const N: usize = FRAME_POOL_LEN> {
    frames: [FrameDescriptor; N],
    free_head: Option<FrameIndex>,
    free_len: usize,
    base: PhysicalAddress,
    stride: u32,
    initialized: bool,
}

impl FramePool<FRAME_POOL_LEN> {
    /// Pool described by the kernel memory layout: 128 frames, 2 MiB apart,
    /// starting at 1 MiB.
    #[must_use]
    pub const fn from_memory_layout() -> Self {
        Self::new(PhysicalAddress::new(FRAME_POOL_BASE), FRAME_STRIDE)
    }
}

impl Default for FramePool<FRAME_POOL_LEN> {
    fn default() -> Self {
        Self::from_memory_layout()
    }
}

impl<const N: usize> FramePool<N> {
    /// Creates an empty, uninitialized pool. Nothing can be allocated
    /// before [`init`](Self::init).
    ///
    /// # Panics
    /// If `N` is zero, does not fit a [`FrameIndex`], or the last frame
    /// would lie beyond the 32-bit physical address space.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(base: PhysicalAddress, stride: u32) -> Self {
        assert!(N > 0 && N <= u16::MAX as usize + 1, "unsupported pool size");
        assert!(
            base.as_u32() as u64 + (N as u64 - 1) * stride as u64 <= u32::MAX as u64,
            "frame pool exceeds the physical address space"
        );
        Self {
            frames: [FrameDescriptor::UNLINKED; N],
            free_head: None,
            free_len: 0,
            base,
            stride,
            initialized: false,
        }
    }

    /// Populates every descriptor and links all of them into the free list
    /// in ascending address order.
    ///
    /// Calling this again rebuilds the pool from scratch; any
    /// [`FrameList`] still held by a caller no longer describes anything
    /// meaningful afterwards.
    #[allow(clippy::cast_possible_truncation)]
    pub fn init(&mut self) {
        let mut address = self.base;
        for (i, frame) in self.frames.iter_mut().enumerate() {
            *frame = FrameDescriptor {
                physical_address: address,
                prev: i.checked_sub(1).map(FrameIndex::from_usize),
                next: (i + 1 < N).then(|| FrameIndex::from_usize(i + 1)),
            };
            // `new` checked that the last address fits, so only the step
            // past the final frame may wrap.
            address = PhysicalAddress::new(address.as_u32().wrapping_add(self.stride));
        }

        self.free_head = Some(FrameIndex(0));
        self.free_len = N;
        self.initialized = true;

        info!(
            "Frame pool: {N} frames from {} every {:#x} bytes",
            self.base, self.stride
        );
    }

    /// Detaches the first `n` descriptors of the free list.
    ///
    /// The returned frames are `n` arbitrary free frames in list order.
    /// Right after [`init`](Self::init) that order is ascending and the
    /// frames are evenly spaced, but once lists have been freed the free
    /// list is in LIFO order and no contiguity is implied.
    ///
    /// # Errors
    /// - [`FrameAllocError::ZeroFrames`] if `n == 0`.
    /// - [`FrameAllocError::Exhausted`] if fewer than `n` frames are free
    ///   (including an uninitialized pool). The free list is left as it was.
    pub fn allocate(&mut self, n: usize) -> Result<FrameList, FrameAllocError> {
        if n == 0 {
            return Err(FrameAllocError::ZeroFrames);
        }

        let exhausted = FrameAllocError::Exhausted {
            requested: n,
            available: self.free_len,
        };

        let Some(head) = self.free_head.filter(|_| n <= self.free_len) else {
            warn!("Frame pool exhausted: {n} frames requested, {} free", self.free_len);
            return Err(exhausted);
        };

        let mut tail = head;
        for _ in 1..n {
            tail = self[tail].next.ok_or(exhausted)?;
        }

        let rest = self.node_mut(tail).next.take();
        if let Some(rest) = rest {
            self.node_mut(rest).prev = None;
        }
        self.node_mut(head).prev = None;
        self.free_head = rest;
        self.free_len -= n;

        debug!(
            "Allocated {n} frames starting at {} ({} left)",
            self[head].physical_address, self.free_len
        );
        Ok(FrameList { head, tail, len: n })
    }

    /// Splices `list` onto the front of the free list in O(1).
    ///
    /// The list must have come from this pool since its last
    /// [`init`](Self::init); that is not checked beyond debug assertions.
    #[allow(clippy::needless_pass_by_value)] // consuming the handle is what prevents a double free
    pub fn free(&mut self, list: FrameList) {
        let FrameList { head, tail, len } = list;
        debug_assert!(head.as_usize() < N && tail.as_usize() < N);
        debug_assert!(self[tail].next.is_none(), "list tail still linked");
        debug_assert!(self.free_len + len <= N, "more frames freed than exist");

        if let Some(old_head) = self.free_head {
            self.node_mut(old_head).prev = Some(tail);
        }
        self.node_mut(tail).next = self.free_head;
        self.node_mut(head).prev = None;
        self.free_head = Some(head);
        self.free_len += len;

        debug!(
            "Freed {len} frames starting at {} ({} free)",
            self[head].physical_address, self.free_len
        );
    }

    /// Physical addresses of `list`, in list order.
    pub const fn frames<'a>(&'a self, list: &FrameList) -> Frames<'a, N> {
        Frames {
            pool: self,
            cursor: Some(list.head),
            remaining: list.len,
        }
    }

    /// Physical addresses on the free list, from the head.
    pub const fn free_frames(&self) -> Frames<'_, N> {
        Frames {
            pool: self,
            cursor: self.free_head,
            remaining: self.free_len,
        }
    }

    /// Descriptor at `index`, if it exists.
    #[must_use]
    pub fn descriptor(&self, index: FrameIndex) -> Option<&FrameDescriptor> {
        self.frames.get(index.as_usize())
    }

    #[must_use]
    pub const fn free_head(&self) -> Option<FrameIndex> {
        self.free_head
    }

    #[must_use]
    pub const fn free_len(&self) -> usize {
        self.free_len
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    const fn node_mut(&mut self, index: FrameIndex) -> &mut FrameDescriptor {
        &mut self.frames[index.as_usize()]
    }
}

impl<const N: usize> Index<FrameIndex> for FramePool<N> {
    type Output = FrameDescriptor;

    #[inline]
    fn index(&self, index: FrameIndex) -> &Self::Output {
        &self.frames[index.as_usize()]
    }
}

/// Iterator over the physical addresses of a run of descriptors.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Frames<'a, const N: usize> {
    pool: &'a FramePool<N>,
    cursor: Option<FrameIndex>,
    remaining: usize,
}

impl<const N: usize> Iterator for Frames<'_, N> {
    type Item = PhysicalAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let frame = &self.pool[self.cursor?];
        self.cursor = frame.next;
        self.remaining -= 1;
        Some(frame.physical_address)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<const N: usize> FusedIterator for Frames<'_, N> {}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u32 = 1024 * 1024;

    fn pool() -> FramePool {
        let mut pool = FramePool::from_memory_layout();
        pool.init();
        pool
    }

    fn addrs<const N: usize>(pool: &FramePool<N>, list: &FrameList) -> Vec<u32> {
        pool.frames(list).map(PhysicalAddress::as_u32).collect()
    }

    #[test]
    fn init_links_every_frame_in_ascending_order() {
        let pool = pool();
        assert!(pool.is_initialized());
        assert_eq!(pool.free_len(), 128);
        assert_eq!(pool.capacity(), 128);

        let free: Vec<u32> = pool.free_frames().map(PhysicalAddress::as_u32).collect();
        assert_eq!(free.len(), 128);
        assert_eq!(free[0], MIB);
        assert_eq!(free[1], 3 * MIB);
        assert_eq!(free[127], MIB + 127 * 2 * MIB);
        assert!(free.windows(2).all(|w| w[1] - w[0] == 2 * MIB));

        assert_eq!(pool[FrameIndex::new(0)].prev(), None);
        assert_eq!(pool[FrameIndex::new(127)].next(), None);
        assert_eq!(pool[FrameIndex::new(5)].prev(), Some(FrameIndex::new(4)));
        assert_eq!(pool[FrameIndex::new(5)].next(), Some(FrameIndex::new(6)));
    }

    #[test]
    fn first_two_frames_come_from_the_bottom_of_the_pool() {
        let mut pool = pool();
        let list = pool.allocate(2).unwrap();
        assert_eq!(addrs(&pool, &list), [0x0010_0000, 0x0030_0000]);
        assert_eq!(pool.free_len(), 126);

        let head = pool.free_head().unwrap();
        assert_eq!(pool[head].physical_address().as_u32(), 0x0050_0000);
        assert_eq!(pool[head].prev(), None);
        assert_eq!(pool[list.head()].prev(), None);
        assert_eq!(pool[list.tail()].next(), None);
    }

    #[test]
    fn free_then_allocate_returns_the_same_run() {
        let mut pool = pool();
        let first = pool.allocate(2).unwrap();
        let before = addrs(&pool, &first);
        pool.free(first);
        assert_eq!(pool.free_len(), 128);

        let second = pool.allocate(2).unwrap();
        assert_eq!(addrs(&pool, &second), before);
    }

    #[test]
    fn zero_frames_is_rejected() {
        let mut pool = pool();
        assert_eq!(pool.allocate(0), Err(FrameAllocError::ZeroFrames));
        assert_eq!(pool.free_len(), 128);
    }

    #[test]
    fn exhaustion_leaves_the_free_list_untouched() {
        let mut pool = pool();
        let most = pool.allocate(120).unwrap();
        let head = pool.free_head();

        assert_eq!(
            pool.allocate(9),
            Err(FrameAllocError::Exhausted {
                requested: 9,
                available: 8
            })
        );
        assert_eq!(pool.free_len(), 8);
        assert_eq!(pool.free_head(), head);
        assert_eq!(pool.free_frames().count(), 8);

        let rest = pool.allocate(8).unwrap();
        assert_eq!(pool.free_head(), None);
        assert_eq!(
            pool.allocate(1),
            Err(FrameAllocError::Exhausted {
                requested: 1,
                available: 0
            })
        );

        pool.free(rest);
        pool.free(most);
        assert_eq!(pool.free_len(), 128);
    }

    #[test]
    fn uninitialized_pool_has_nothing_to_give() {
        let mut pool = FramePool::from_memory_layout();
        assert!(!pool.is_initialized());
        assert_eq!(
            pool.allocate(1),
            Err(FrameAllocError::Exhausted {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn freed_lists_are_pushed_to_the_front() {
        let mut pool = pool();
        let a = pool.allocate(3).unwrap();
        let b = pool.allocate(2).unwrap();
        let a_addrs = addrs(&pool, &a);
        let b_addrs = addrs(&pool, &b);

        pool.free(a);
        pool.free(b);

        let free: Vec<u32> = pool.free_frames().map(PhysicalAddress::as_u32).collect();
        assert_eq!(&free[..2], b_addrs.as_slice());
        assert_eq!(&free[2..5], a_addrs.as_slice());
        assert_eq!(free[5], 11 * MIB);
        assert_eq!(free.len(), 128);

        // Mixed order after frees: a run of three is no longer evenly spaced.
        let c = pool.allocate(3).unwrap();
        assert_eq!(addrs(&pool, &c), [b_addrs[0], b_addrs[1], a_addrs[0]]);
        pool.free(c);
    }

    #[test]
    fn every_descriptor_is_on_exactly_one_list() {
        let mut pool = pool();
        let mut held = Vec::new();

        for n in [1, 7, 16, 2, 30] {
            held.push(pool.allocate(n).unwrap());
            let allocated: usize = held.iter().map(FrameList::len).sum();
            assert_eq!(pool.free_len() + allocated, 128);
        }

        pool.free(held.remove(1));
        pool.free(held.remove(2));
        held.push(pool.allocate(40).unwrap());

        let allocated: usize = held.iter().map(FrameList::len).sum();
        assert_eq!(pool.free_len() + allocated, 128);

        let mut seen: Vec<u32> = pool.free_frames().map(PhysicalAddress::as_u32).collect();
        for list in &held {
            seen.extend(addrs(&pool, list));
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 128);
    }

    #[test]
    fn small_pools_use_their_own_geometry() {
        let mut pool = FramePool::<4>::new(PhysicalAddress::new(0x8000), 0x1000);
        pool.init();
        let all = pool.allocate(4).unwrap();
        assert_eq!(addrs(&pool, &all), [0x8000, 0x9000, 0xA000, 0xB000]);
        assert!(pool.allocate(1).is_err());
        pool.free(all);
        assert_eq!(pool.free_len(), 4);
    }

    #[test]
    fn reinit_restores_a_fresh_pool() {
        let mut pool = pool();
        let _leaked = pool.allocate(10).unwrap();
        pool.init();
        assert_eq!(pool.free_len(), 128);
        assert_eq!(pool.free_frames().next(), Some(PhysicalAddress::new(MIB)));
    }
}
