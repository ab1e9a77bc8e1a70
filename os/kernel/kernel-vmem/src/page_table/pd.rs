//! # Page Directory (upper level)
//!
//! - [`PdIndex`]: index type for virtual-address bits `[31:22]`.
//! - [`Pde`]: a directory entry pointing at a 4 KiB [page table](super::pt::PageTable).
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 entries.
//!
//! Large (4 MiB, `PS=1`) directory entries are never created here; the
//! `page_size` bit is modelled so that a foreign directory can be decoded,
//! and [`Pde::table`] refuses to follow such an entry.

use crate::page_table::{ENTRY_COUNT, INDEX_MASK};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, Size4M, VirtualAddress};

/// Index into the page directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

impl PdIndex {
    /// Extract bits `[31:22]` of `va`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> Size4M::SHIFT) & INDEX_MASK) as u16)
    }

    /// Construct from a raw `u16`.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRY_COUNT);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// First virtual address covered by this directory slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << Size4M::SHIFT)
    }
}

/// Page directory entry pointing at a page table (`PS=0`).
///
/// Hardware layout (32-bit paging, Intel SDM Vol. 3A, Table 4-5).
#[doc(alias = "PDE")]
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Pde {
    /// Present (bit 0).
    pub present: bool,
    /// Writable (bit 1). Applies to the whole 4 MiB region below.
    pub writable: bool,
    /// User (bit 2). Clear means supervisor only.
    pub user: bool,
    /// Write-Through (bit 3).
    pub write_through: bool,
    /// Cache Disable (bit 4).
    pub cache_disable: bool,
    /// Accessed (bit 5), set by the CPU.
    pub accessed: bool,
    /// Bit 6: ignored for table pointers.
    #[bits(1)]
    __ignored_6: u8,
    /// Page Size (bit 7). Must be 0 for a table pointer.
    pub page_size: bool,
    /// Bit 8: ignored for table pointers.
    #[bits(1)]
    __ignored_8: u8,
    /// Available to the OS (bits 9..11).
    #[bits(3)]
    pub os_available: u8,
    /// Page table frame number (bits 12..31).
    #[bits(20)]
    table_frame: u32,
}

impl Pde {
    /// Present, writable, supervisor-only pointer to `table` with default
    /// (write-back, cached) attributes.
    #[inline]
    #[must_use]
    pub const fn new_kernel_table(table: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user(false)
            .with_write_through(false)
            .with_cache_disable(false)
            .with_page_size(false)
            .with_table_frame(table.number())
    }

    /// Frame number field as stored (physical address `>> 12`).
    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> u32 {
        self.table_frame()
    }

    /// The page table this entry points at, if it is present and not a
    /// large page.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<PhysicalPage<Size4K>> {
        if self.present() && !self.page_size() {
            Some(PhysicalPage::from_number(self.table_frame()))
        } else {
            None
        }
    }
}

/// The page directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [Pde; ENTRY_COUNT],
}

impl PageDirectory {
    /// A directory with every entry absent.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [Pde::new(); ENTRY_COUNT],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PdIndex) -> Pde {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: PdIndex, e: Pde) {
        self.entries[i.as_usize()] = e;
    }

    /// Mark every entry absent.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(Pde::new());
    }

    /// Present entries with their slot.
    pub fn present_entries(&self) -> impl Iterator<Item = (PdIndex, Pde)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.present())
            .map(|(i, e)| (index_at(i), *e))
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn index_at(i: usize) -> PdIndex {
    PdIndex::new(i as u16)
}

const _: () = {
    assert!(size_of::<PageDirectory>() == Size4K::SIZE as usize);
};

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn kernel_table_entry_bits() {
        let table = PhysicalAddress::new(0x0040_3000).page::<Size4K>();
        let e = Pde::new_kernel_table(table);
        assert_eq!(e.into_bits(), 0x0040_3003);
        assert_eq!(e.frame_number(), 0x403);
        assert_eq!(e.table(), Some(table));
    }

    #[test]
    fn absent_and_large_entries_have_no_table() {
        assert_eq!(Pde::new().table(), None);
        let large = Pde::from_bits(0x0040_0083);
        assert!(large.present());
        assert!(large.page_size());
        assert_eq!(large.table(), None);
    }

    #[test]
    fn directory_index_covers_four_megabytes() {
        let i = PdIndex::from(VirtualAddress::new(0x0081_2345));
        assert_eq!(i.as_usize(), 2);
        assert_eq!(i.base(), VirtualAddress::new(0x0080_0000));
    }

    #[test]
    fn clear_drops_every_entry() {
        let mut pd = PageDirectory::zeroed();
        let table = PhysicalAddress::new(0x1000).page::<Size4K>();
        pd.set(PdIndex::new(0), Pde::new_kernel_table(table));
        pd.set(PdIndex::new(1023), Pde::new_kernel_table(table));
        assert_eq!(pd.present_entries().count(), 2);
        pd.clear();
        assert_eq!(pd.present_entries().count(), 0);
    }
}
