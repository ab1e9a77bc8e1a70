//! # Two-Level Page Tables (i386, non-PAE)
//!
//! A 32-bit linear address is split as
//!
//! ```text
//!  31          22 21          12 11           0
//! ┌──────────────┬──────────────┬──────────────┐
//! │  PD index    │  PT index    │  offset      │
//! └──────────────┴──────────────┴──────────────┘
//! ```
//!
//! Both levels hold [`ENTRY_COUNT`] entries of four bytes, so each table is
//! exactly one 4 KiB page.

pub mod pd;
pub mod pt;

use crate::page_table::pd::PdIndex;
use crate::page_table::pt::PtIndex;
use kernel_memory_addresses::VirtualAddress;

/// Entries per page directory and per page table.
pub const ENTRY_COUNT: usize = 1024;

/// Mask applied to a shifted address to get a 10-bit table index.
const INDEX_MASK: u32 = 0x3FF;

const _: () = assert!(INDEX_MASK as usize + 1 == ENTRY_COUNT);

#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (PdIndex, PtIndex) {
    (PdIndex::from(va), PtIndex::from(va))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_come_from_bits_31_22_and_21_12() {
        let (pd, pt) = split_indices(VirtualAddress::new(0xC03F_F123));
        assert_eq!(pd.as_usize(), 0x300);
        assert_eq!(pt.as_usize(), 0x3FF);

        let (pd, pt) = split_indices(VirtualAddress::new(0x000B_8000));
        assert_eq!(pd.as_usize(), 0);
        assert_eq!(pt.as_usize(), 0xB8);

        let (pd, pt) = split_indices(VirtualAddress::new(0xFFFF_FFFF));
        assert_eq!(pd.as_usize(), 1023);
        assert_eq!(pt.as_usize(), 1023);
    }
}
