//! # Kernel Configuration and Boot Layout
//!
//! Compile-time memory layout of the 32-bit kernel and the small record the
//! boot code fills in before paging is switched on.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000       ┌─────────────────────────────────┐
//!                   │   Low Memory (< 1 MiB)          │
//! VGA_TEXT_BUFFER   │   0x000B_8000: text mode cells  │
//!                   │                                 │
//! PHYS_LOAD         ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!                   │   Kernel Image                  │
//!                   │   (.multiboot, text, data, bss) │
//!                   │   boot stack lives in .bss      │
//! _end_kernel       ├─────────────────────────────────┤
//!                   │   ...                           │
//!                   └─────────────────────────────────┘
//!
//! Frame pool descriptors (FRAME_POOL_LEN of them):
//!   FRAME_POOL_BASE + i * FRAME_STRIDE   for i in 0..FRAME_POOL_LEN
//!   0x0010_0000, 0x0030_0000, 0x0050_0000, ... 0x0FF0_0000
//! ```
//!
//! The first pool descriptor coincides with the kernel load address. The
//! pool hands out descriptors, not memory; callers that write to an
//! allocated frame must make sure it does not overlap the image.
//!
//! ## Build Integration
//!
//! ```rust
//! use kernel_info::memory::PHYS_LOAD;
//!
//! println!("cargo:rustc-link-arg-bins=--defsym=PHYS_LOAD={PHYS_LOAD:#x}");
//! ```
//!
//! ## Boot Layout
//!
//! [`BootLayout`](boot::BootLayout) carries the addresses that are only
//! known at run time (end of image, stack pointer) to the identity-mapping
//! code.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
