#[cfg(all(feature = "asm", target_arch = "x86"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalPage, Size4K};

/// CR3: Page-Directory Base Register (32-bit paging, no PAE).
///
/// Holds the physical base of the page directory and the cache-control
/// flags used when the CPU walks it. Writing CR3 also flushes all
/// non-global TLB entries.
#[bitfield(u32)]
pub struct Cr3 {
    /// Bits 0-2: Ignored.
    #[bits(3, default = 0)]
    _ignored_0_2: u8,

    /// Bit 3: Page-level Write-Through (PWT) for directory accesses.
    pub pwt: bool,

    /// Bit 4: Page-level Cache Disable (PCD) for directory accesses.
    pub pcd: bool,

    /// Bits 5-11: Ignored.
    #[bits(7, default = 0)]
    _ignored_5_11: u8,

    /// Bits 12-31: Page directory physical base >> 12.
    #[bits(20)]
    directory_base_4k: u32,
}

impl Cr3 {
    /// Create a `Cr3` value pointing at the page directory in `directory`.
    #[must_use]
    pub const fn from_directory(directory: PhysicalPage<Size4K>, pwt: bool, pcd: bool) -> Self {
        Self::new()
            .with_pwt(pwt)
            .with_pcd(pcd)
            .with_directory_base_4k(directory.number())
    }

    /// The page holding the page directory.
    #[must_use]
    pub const fn directory(&self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_number(self.directory_base_4k())
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn directory_base_occupies_upper_twenty_bits() {
        let dir = PhysicalAddress::new(0x0012_3000).page::<Size4K>();
        let cr3 = Cr3::from_directory(dir, false, false);
        assert_eq!(cr3.into_bits(), 0x0012_3000);
        assert_eq!(cr3.directory(), dir);
    }

    #[test]
    fn cache_flags_sit_below_the_base() {
        let dir = PhysicalAddress::new(0xFFFF_F000).page::<Size4K>();
        let cr3 = Cr3::from_directory(dir, true, true);
        assert_eq!(cr3.into_bits(), 0xFFFF_F018);
    }
}
