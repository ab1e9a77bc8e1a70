//! # Physical Page Frame Allocation
//!
//! Book-keeping for the physical page frames the kernel may hand out during
//! early boot.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Address Translator                  │
//! │    (kernel-vmem: maps frame addresses to pages)     │
//! └─────────────────▲───────────────────────────────────┘
//!                   │  FramePool::frames(&list)
//! ┌─────────────────┴───────────────────────────────────┐
//! │                 Frame Pool                          │
//! │    • fixed arena of 128 descriptors                 │
//! │    • intrusive doubly linked free list              │
//! │    • O(n) allocate, O(1) free                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The pool never touches the memory its descriptors stand for; it only
//! tracks which descriptors are free. The translator consumes the physical
//! addresses of a [`FrameList`](frame_pool::FrameList) through an iterator
//! and never sees the list links.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::frame_pool::{FrameAllocError, FramePool};
//!
//! let mut pool = FramePool::from_memory_layout();
//! pool.init();
//!
//! let pair = pool.allocate(2)?;
//! let addresses: Vec<u32> = pool.frames(&pair).map(|pa| pa.as_u32()).collect();
//! assert_eq!(addresses, [0x0010_0000, 0x0030_0000]);
//!
//! pool.free(pair);
//! assert_eq!(pool.free_len(), 128);
//! # Ok::<(), FrameAllocError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod frame_pool;
