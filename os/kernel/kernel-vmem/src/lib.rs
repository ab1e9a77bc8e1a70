//! # 32-bit Address Translation
//!
//! Builds the page directory and page tables for i386 non-PAE paging and
//! switches the CPU into translated mode.
//!
//! ## Overview
//!
//! ```text
//!   CR3 ──▶ PageDirectory (1024 × Pde, 4 KiB)
//!               │ Pde[va >> 22]
//!               ▼
//!           PageTable     (1024 × Pte, 4 KiB)
//!               │ Pte[(va >> 12) & 0x3FF]
//!               ▼
//!           4 KiB page  + (va & 0xFFF)
//! ```
//!
//! The [`Translator`](translator::Translator) owns one directory page and a
//! fixed set of table pages. It moves through three stages:
//!
//! 1. [`Stage::Unmapped`](translator::Stage::Unmapped): all entries absent.
//! 2. [`Stage::TablesBuilt`](translator::Stage::TablesBuilt): at least one
//!    page mapped, nothing committed to hardware yet.
//! 3. [`Stage::TranslationActive`](translator::Stage::TranslationActive):
//!    CR3 loaded and CR0.PG set. The tables are frozen from then on.
//!
//! Hardware access goes through [`TranslationControl`](control::TranslationControl)
//! and physical memory is reached through a [`PhysMapper`], so the whole
//! crate can be exercised on the host with in-memory frames.
//!
//! ## Identity mapping
//!
//! [`identity_map_regions`](translator::Translator::identity_map_regions)
//! maps the kernel image, the pages around the stack pointer and the VGA
//! text buffer 1:1 so that execution continues uninterrupted once paging
//! is enabled.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod control;
pub mod identity;
pub mod page_table;
pub mod phys_mapper;
pub mod translator;

pub use crate::control::TranslationControl;
pub use crate::page_table::pd::{PageDirectory, PdIndex, Pde};
pub use crate::page_table::pt::{PageTable, PtIndex, Pte};
pub use crate::translator::{OverflowPolicy, Stage, TranslateError, Translator};

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Converts physical addresses to *temporarily* usable pointers in the
/// current address space.
///
/// Before paging is enabled, and afterwards for identity-mapped memory,
/// this is the identity function ([`IdentityPhysMapper`](phys_mapper::IdentityPhysMapper)).
/// Tests back "physical memory" with a heap buffer instead.
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be reachable and writable in the current address space
    ///   for the whole of `'a`.
    /// - The bytes at `pa` must be a valid `T` and suitably aligned.
    /// - No other reference to the same memory may be alive while the
    ///   returned one is used.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Typed views of page-table pages.
pub(crate) trait PhysMapperExt: PhysMapper {
    /// # Safety
    /// See [`PhysMapper::phys_to_mut`]; `page` must hold a page directory.
    #[inline]
    unsafe fn pd_mut<'a>(&self, page: PhysicalPage<Size4K>) -> &'a mut PageDirectory {
        unsafe { self.phys_to_mut::<PageDirectory>(page.base()) }
    }

    /// # Safety
    /// See [`PhysMapper::phys_to_mut`]; `page` must hold a page table.
    #[inline]
    unsafe fn pt_mut<'a>(&self, page: PhysicalPage<Size4K>) -> &'a mut PageTable {
        unsafe { self.phys_to_mut::<PageTable>(page.base()) }
    }
}

impl<M: PhysMapper + ?Sized> PhysMapperExt for M {}

#[cfg(test)]
pub(crate) mod test_phys {
    use super::PhysMapper;
    use core::cell::UnsafeCell;
    use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

    /// A 4 KiB-aligned raw frame. We use this as our "physical RAM" backing store in tests.
    #[repr(C, align(4096))]
    struct Frame([u8; 4096]);

    /// Fake physical memory: frame `i` lives at physical address `i * 4096`.
    pub struct TestPhys {
        frames: Box<[UnsafeCell<Frame>]>,
    }

    impl TestPhys {
        pub fn new(frames: usize) -> Self {
            Self {
                frames: (0..frames)
                    .map(|_| UnsafeCell::new(Frame([0; 4096])))
                    .collect(),
            }
        }

        pub fn page(index: u32) -> PhysicalPage<Size4K> {
            PhysicalPage::from_number(index)
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
            let pa = pa.as_u32() as usize;
            let frame = self.frames[pa / 4096].get().cast::<u8>();
            unsafe { &mut *frame.add(pa % 4096).cast::<T>() }
        }
    }
}
