//! # Page Table (lower level)
//!
//! - [`PtIndex`]: index type for VA bits `[21:12]`.
//! - [`Pte`]: a 4 KiB leaf mapping.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 PTEs.
//!
//! The frame stored in a PTE is a 4 KiB page number; after modifying an
//! active table the caller is responsible for TLB maintenance.

use crate::page_table::{ENTRY_COUNT, INDEX_MASK};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, VirtualAddress};

/// Index into a page table (derived from VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

impl PtIndex {
    /// Extract bits `[21:12]` of `va`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> Size4K::SHIFT) & INDEX_MASK) as u16)
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
}

/// Page table entry mapping one 4 KiB page.
///
/// Hardware layout (32-bit paging, Intel SDM Vol. 3A, Table 4-6).
#[doc(alias = "PTE")]
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Pte {
    /// Present (bit 0).
    pub present: bool,
    /// Writable (bit 1).
    pub writable: bool,
    /// User (bit 2). Clear means supervisor only.
    pub user: bool,
    /// Write-Through (bit 3).
    pub write_through: bool,
    /// Cache Disable (bit 4).
    pub cache_disable: bool,
    /// Accessed (bit 5), set by the CPU.
    pub accessed: bool,
    /// Dirty (bit 6), set by the CPU on the first write.
    pub dirty: bool,
    /// Page Attribute Table index bit (bit 7).
    pub pat: bool,
    /// Global (bit 8), only honoured with CR4.PGE.
    pub global: bool,
    /// Available to the OS (bits 9..11).
    #[bits(3)]
    pub os_available: u8,
    /// Page frame number (bits 12..31).
    #[bits(20)]
    page_frame: u32,
}

impl Pte {
    /// Present, writable, supervisor-only mapping of `page`.
    #[inline]
    #[must_use]
    pub const fn new_kernel_page(page: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user(false)
            .with_page_frame(page.number())
    }

    /// Frame number field as stored (physical address `>> 12`).
    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> u32 {
        self.page_frame()
    }

    /// The mapped page, if present.
    #[inline]
    #[must_use]
    pub const fn page(self) -> Option<PhysicalPage<Size4K>> {
        if self.present() {
            Some(PhysicalPage::from_number(self.page_frame()))
        } else {
            None
        }
    }
}

/// A page table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Pte; ENTRY_COUNT],
}

impl PageTable {
    /// A table with every entry absent.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [Pte::new(); ENTRY_COUNT],
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: PtIndex) -> Pte {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn set(&mut self, i: PtIndex, e: Pte) {
        self.entries[i.as_usize()] = e;
    }

    /// Mark every entry absent.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(Pte::new());
    }

    /// Number of present entries.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.present()).count()
    }
}

const _: () = {
    assert!(size_of::<PageTable>() == Size4K::SIZE as usize);
};

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn kernel_page_entry_bits() {
        let page = PhysicalAddress::new(0x0030_0000).page::<Size4K>();
        let e = Pte::new_kernel_page(page);
        assert_eq!(e.into_bits(), 0x0030_0003);
        assert_eq!(e.frame_number(), 0x300);
        assert_eq!(e.page(), Some(page));
        assert!(!e.user());
    }

    #[test]
    fn hardware_owned_bits_sit_at_five_and_six() {
        let e = Pte::from_bits(0x0000_0061);
        assert!(e.present());
        assert!(e.accessed());
        assert!(e.dirty());
        assert!(!e.pat());
    }

    #[test]
    fn table_index_ignores_directory_bits() {
        let a = PtIndex::from(VirtualAddress::new(0x0000_5000));
        let b = PtIndex::from(VirtualAddress::new(0x0040_5000));
        assert_eq!(a, b);
        assert_eq!(a.as_usize(), 5);
    }
}
