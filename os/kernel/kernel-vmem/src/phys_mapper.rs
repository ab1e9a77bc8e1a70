//! # Identity `PhysMapper`
//!
//! Before paging is enabled every physical address is directly usable as a
//! pointer. The identity map built by the translator keeps that true for
//! the kernel image, the stack and the text buffer afterwards.

use crate::PhysMapper;
use kernel_memory_addresses::PhysicalAddress;

/// [`PhysMapper`] for a flat, untranslated (or identity-mapped) address space.
///
/// Only meaningful on the 32-bit target; on a host the references it
/// produces point at nothing.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = core::ptr::with_exposed_provenance_mut::<T>(pa.as_u32() as usize);
        debug_assert!(ptr.is_aligned(), "misaligned physical address {pa}");
        unsafe { &mut *ptr }
    }
}
