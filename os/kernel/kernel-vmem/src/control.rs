//! # Translation Control
//!
//! The two privileged steps that commit a directory to the MMU, behind a
//! trait so that the translator can be driven by a recording fake in tests.

use kernel_memory_addresses::{PhysicalPage, Size4K};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr3::Cr3;

/// Platform capability to install a page directory and turn on paging.
pub trait TranslationControl {
    /// Make `directory` the active page directory (CR3 on x86).
    ///
    /// Reloading while paging is active flushes all non-global TLB entries.
    ///
    /// # Safety
    /// `directory` must hold a valid page directory. If paging is already
    /// enabled, the directory must map the currently executing code and
    /// stack.
    unsafe fn load_base(&mut self, directory: PhysicalPage<Size4K>);

    /// Turn on protected-mode paging (CR0.PE and CR0.PG on x86).
    ///
    /// # Safety
    /// A directory must have been loaded that identity-maps the executing
    /// code, the stack and every device the caller touches next.
    unsafe fn enable(&mut self);
}

/// CR3 value for `directory`: write-back and cached directory walks.
#[must_use]
pub const fn cr3_for(directory: PhysicalPage<Size4K>) -> Cr3 {
    Cr3::from_directory(directory, false, false)
}

/// CR0 value that enables paging on top of `current`.
#[must_use]
pub const fn cr0_with_paging(current: Cr0) -> Cr0 {
    current.with_paging_enabled()
}

/// [`TranslationControl`] that writes the real control registers.
#[cfg(target_arch = "x86")]
#[derive(Debug)]
pub struct X86TranslationControl {
    _private: (),
}

#[cfg(target_arch = "x86")]
impl X86TranslationControl {
    /// # Safety
    /// The caller must be running in ring 0.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86")]
impl TranslationControl for X86TranslationControl {
    unsafe fn load_base(&mut self, directory: PhysicalPage<Size4K>) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { cr3_for(directory).store_unsafe() };
    }

    unsafe fn enable(&mut self) {
        use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
        unsafe {
            let cr0 = Cr0::load_unsafe();
            cr0_with_paging(cr0).store_unsafe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn cr3_holds_only_the_directory_base() {
        let dir = PhysicalAddress::new(0x0010_7000).page::<Size4K>();
        assert_eq!(cr3_for(dir).into_bits(), 0x0010_7000);
    }

    #[test]
    fn cr0_gains_pe_and_pg() {
        assert_eq!(cr0_with_paging(Cr0::new()).into_bits(), 0x8000_0001);
        assert_eq!(cr0_with_paging(Cr0::from_bits(0x11)).into_bits(), 0x8000_0011);
    }
}
